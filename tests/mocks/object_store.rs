use anyhow::Result;
use quiknews::cloud::storage::ObjectStore;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockObjectStore {
    /// (key, uploaded bytes)
    pub uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl ObjectStore for MockObjectStore {
    fn upload(&self, local: &Path, key: &str) -> Result<()> {
        let data = fs::read(local)?;
        self.uploads.lock().unwrap().push((key.to_string(), data));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://storage.test/bucket/{key}")
    }
}
