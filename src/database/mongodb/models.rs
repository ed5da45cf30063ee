pub use self::audit::*;
pub use self::model::*;

mod audit;
mod model;
