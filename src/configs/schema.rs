use crate::models::{SensorReadingTable, SensorTable, Table, UserTable};

/// Orders table definitions so that every table is created after the tables
/// it references, and disposed in the reverse order.
pub struct SchemaManager {
    tables: Vec<Box<dyn Table>>,
}

impl SchemaManager {
    pub fn new(tables: Vec<Box<dyn Table>>) -> Self {
        Self {
            tables: Self::sort_tables(tables),
        }
    }

    fn sort_tables(mut unresolved: Vec<Box<dyn Table>>) -> Vec<Box<dyn Table>> {
        let mut sorted: Vec<Box<dyn Table>> = Vec::with_capacity(unresolved.len());

        while !unresolved.is_empty() {
            let resolved: Vec<&'static str> = sorted.iter().map(|table| table.name()).collect();

            let ready = unresolved.iter().position(|table| {
                table
                    .dependencies()
                    .iter()
                    .all(|dependency| resolved.contains(dependency))
            });

            match ready {
                Some(index) => sorted.push(unresolved.swap_remove(index)),
                None => panic!("circular dependency detected between table definitions"),
            }
        }

        sorted
    }

    pub fn create_schema(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.create()).collect()
    }

    pub fn dispose_schema(&self) -> Vec<String> {
        self.tables.iter().rev().map(|table| table.dispose()).collect()
    }
}

impl Default for SchemaManager {
    fn default() -> Self {
        SchemaManager::new(vec![
            Box::new(SensorReadingTable),
            Box::new(SensorTable),
            Box::new(UserTable),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_order_follows_dependencies() {
        let manager = SchemaManager::default();
        let statements = manager.create_schema();

        assert!(statements[0].contains("users"));
        assert!(statements[1].contains("sensors"));
        assert!(statements[2].contains("sensor_readings"));
    }

    #[test]
    fn test_dispose_order_is_reversed() {
        let manager = SchemaManager::default();
        let statements = manager.dispose_schema();

        assert!(statements[0].contains("sensor_readings"));
        assert!(statements[2].contains("users"));
    }
}
