//! Configuration access port trait.

/// Read-only view over a sectioned key/value configuration.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// Keys present in `section`, lowercased and sorted. Empty when the
    /// section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
