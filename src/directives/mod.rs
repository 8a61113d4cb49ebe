mod expect;
mod match_line;
mod reply;
mod timeout;

pub use expect::Expect;
pub use match_line::MatchLine;
pub use reply::Reply;
pub use timeout::Timeout;
