pub mod feed;
pub mod ledger;
pub mod mailer;
pub mod midrange;
pub mod sql;
pub mod util;

pub use feed::FeedSource;
pub use ledger::LedgerDownstream;
pub use mailer::{HttpMailer, LogNotifier};
pub use midrange::MidrangeDownstream;
