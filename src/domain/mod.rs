mod account;
mod business;
mod commodity;
mod guid;
mod numeric;
mod opening;
mod transaction;

pub use account::*;
pub use business::*;
pub use commodity::*;
pub use guid::*;
pub use numeric::*;
pub use opening::*;
pub use transaction::*;
