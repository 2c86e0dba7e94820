use bytes::Bytes;

use crate::facade::{absent_on_error, CapabilityFacade};
use crate::platform::{BlobRef, FsItem, UploadFile};

/// Blob group. One attempt per call, no retries.
pub struct FsCapability<'a> {
    pub(super) facade: &'a CapabilityFacade,
}

impl FsCapability<'_> {
    pub async fn write(&self, path: &str, data: Bytes) -> Option<BlobRef> {
        let platform = self.facade.platform()?;
        absent_on_error("fs.write", platform.fs().write(path, data).await)
            .map(|item| BlobRef::new(item.path))
    }

    pub async fn read(&self, path: &str) -> Option<Bytes> {
        let platform = self.facade.platform()?;
        absent_on_error("fs.read", platform.fs().read(path).await)
    }

    pub async fn upload_batch(&self, files: Vec<UploadFile>) -> Option<BlobRef> {
        let platform = self.facade.platform()?;
        absent_on_error("fs.upload", platform.fs().upload(files).await)
            .map(|item| BlobRef::new(item.path))
    }

    /// Returns whether the platform confirmed the removal.
    pub async fn delete(&self, path: &str) -> bool {
        let Some(platform) = self.facade.platform() else {
            return false;
        };
        absent_on_error("fs.delete", platform.fs().delete(path).await).is_some()
    }

    pub async fn list_dir(&self, path: &str) -> Option<Vec<BlobRef>> {
        self.read_dir(path)
            .await
            .map(|items| items.into_iter().map(|item| BlobRef::new(item.path)).collect())
    }

    /// Like [`FsCapability::list_dir`] but keeps names, sizes and timestamps.
    pub async fn read_dir(&self, path: &str) -> Option<Vec<FsItem>> {
        let platform = self.facade.platform()?;
        absent_on_error("fs.readdir", platform.fs().readdir(path).await)
    }
}

#[cfg(test)]
mod tests {
    use crate::facade::test_support::bound_facade;
    use crate::facade::CapabilityFacade;
    use crate::platform::memory::MemoryPlatform;
    use crate::shared_state::SharedState;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_unbound_calls_are_absent() {
        let facade = CapabilityFacade::new(SharedState::new());
        let fs = facade.fs();
        assert!(fs.write("/a.pdf", Bytes::from_static(b"a")).await.is_none());
        assert!(fs.read("/a.pdf").await.is_none());
        assert!(!fs.delete("/a.pdf").await);
        assert!(fs.list_dir("/").await.is_none());
        assert!(facade.state().error().is_none());
    }

    #[tokio::test]
    async fn test_write_read_list_delete() {
        let (facade, platform) = bound_facade(MemoryPlatform::new());
        let fs = facade.fs();

        let blob = fs.write("./a.pdf", Bytes::from_static(b"pdf")).await.unwrap();
        assert_eq!(blob.path(), "/a.pdf");
        assert_eq!(fs.read(blob.path()).await.unwrap(), Bytes::from_static(b"pdf"));
        assert_eq!(fs.list_dir("./").await.unwrap(), vec![blob.clone()]);

        assert!(fs.delete(blob.path()).await);
        assert_eq!(platform.memory_fs().file_count(), 0);
    }

    #[tokio::test]
    async fn test_platform_failure_is_absent_not_error() {
        let (facade, _platform) = bound_facade(MemoryPlatform::new());
        assert!(facade.fs().read("/missing.png").await.is_none());
        assert!(!facade.fs().delete("/missing.png").await);
        assert!(facade.state().error().is_none());
    }
}
