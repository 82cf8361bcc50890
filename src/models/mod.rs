mod schema;
mod sensor;
mod sensor_reading;
mod user;

pub use schema::{Column, ColumnKind};
pub use sensor::{Sensor, SensorTable};
pub use sensor_reading::{iso8601, SensorReading, SensorReadingTable};
pub use user::{User, UserTable};

pub trait Table {
    /// The name of the table
    fn name(&self) -> &'static str;

    /// The SQL statement to create the table
    fn create(&self) -> String;

    /// The SQL statement to dispose the table
    fn dispose(&self) -> String;

    /// The dependencies of the table
    fn dependencies(&self) -> Vec<&'static str>;
}
