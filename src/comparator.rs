//! Output comparison

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

/// Decides whether a program's output matches the expected answer
#[async_trait]
pub trait Comparator: Send + Sync {
    async fn is_output_the_same(&self, expected_path: &Path, actual_path: &Path) -> Result<bool>;
}

/// Byte-for-byte comparison of the two files
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteComparator;

#[async_trait]
impl Comparator for ByteComparator {
    async fn is_output_the_same(&self, expected_path: &Path, actual_path: &Path) -> Result<bool> {
        let expected = fs::read(expected_path)
            .await
            .with_context(|| format!("Failed to read expected output {:?}", expected_path))?;
        let actual = fs::read(actual_path)
            .await
            .with_context(|| format!("Failed to read program output {:?}", actual_path))?;
        Ok(expected == actual)
    }
}
