//! Shared test utilities and fixtures.
//!
//! Reusable property-based strategies and filesystem fixtures used by tests
//! that cut across module boundaries.

use proptest::prelude::*;
use proptest::strategy::{BoxedStrategy, Strategy};
use std::time::Duration;
use tempfile::TempDir;

/// Maximum duration for timeouts in milliseconds, used to bound generated
/// `Duration` values to something a test can actually wait on.
const MAX_TIMEOUT_MS: u64 = 30_000;

/// Create a temporary directory for test files.
pub fn create_test_dir() -> std::io::Result<TempDir> {
    tempfile::tempdir()
}

/// A strategy generating random durations within `[0, MAX_TIMEOUT_MS]`.
pub fn duration_strategy() -> BoxedStrategy<Duration> {
    (0..MAX_TIMEOUT_MS)
        .prop_map(Duration::from_millis)
        .boxed()
}

/// Test fixture bundling a temporary directory with environment variables
/// that should be cleaned up when the test ends.
pub struct TestFixture {
    /// Temporary directory for test files.
    pub temp_dir: TempDir,
    env_vars: Vec<String>,
}

impl TestFixture {
    /// Creates a new test fixture.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = create_test_dir()?;
        Ok(Self {
            temp_dir,
            env_vars: Vec::new(),
        })
    }

    /// Sets an environment variable for the duration of the test; it is
    /// removed again when this fixture is dropped.
    pub fn set_env<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key_str = key.into();
        std::env::set_var(&key_str, value.into());
        self.env_vars.push(key_str);
    }

    /// Creates a temporary file within the fixture directory.
    pub fn create_file<C: AsRef<[u8]>>(
        &self,
        contents: C,
        extension: &str,
    ) -> std::io::Result<std::path::PathBuf> {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile_in(&self.temp_dir)?;
        std::io::Write::write_all(&mut file, contents.as_ref())?;
        Ok(file.path().to_path_buf())
    }
}

impl Drop for TestFixture {
    fn drop(&mut self) {
        for key in &self.env_vars {
            std::env::remove_var(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_cleans_up_environment_variables_on_drop() {
        let key = "BOBA_PIPELINE_TEST_FIXTURE_VAR";
        {
            let mut fixture = TestFixture::new().unwrap();
            fixture.set_env(key, "value");
            assert_eq!(std::env::var(key).unwrap(), "value");
        }
        assert!(std::env::var(key).is_err());
    }

    #[test]
    fn create_file_writes_contents() {
        let fixture = TestFixture::new().unwrap();
        let path = fixture.create_file("hello", ".txt").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
