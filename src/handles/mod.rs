mod reading_handle;
mod sensor_handle;
mod user_handle;

pub use reading_handle::*;
pub use sensor_handle::*;
pub use user_handle::*;
