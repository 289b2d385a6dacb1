//! The default `TarCodec` collaborator: a thin wrapper over the `tar`
//! crate. Archives are plain (uncompressed) TARs, matching the OCI layer
//! media type and the packager's output.

use super::TarCodec;
use crate::err::{Error, Res};
use std::fs::File;
use std::path::Path;

pub struct DefaultTarCodec;

impl TarCodec for DefaultTarCodec {
    fn pack(&self, dir: &Path, archive: &Path) -> Res<()> {
        let file = File::create(archive)?;
        let mut builder = tar::Builder::new(file);
        builder
            .append_dir_all(".", dir)
            .map_err(failure::Error::from)
            .map_err(Error::from)?;
        builder
            .finish()
            .map_err(failure::Error::from)
            .map_err(Error::from)?;
        Ok(())
    }

    fn unpack(&self, archive: &Path, into: &Path) -> Res<()> {
        let file = File::open(archive)?;
        let mut archive = tar::Archive::new(file);
        archive
            .unpack(into)
            .map_err(failure::Error::from)
            .map_err(Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn pack_then_unpack_round_trips() {
        let src = TempDir::new("kpm-tar-src").unwrap();
        let dst = TempDir::new("kpm-tar-dst").unwrap();
        let archive_dir = TempDir::new("kpm-tar-archive").unwrap();
        let archive_path = archive_dir.path().join("out.tar");

        fs::write(src.path().join("a.txt"), "hello").unwrap();

        let codec = DefaultTarCodec;
        codec.pack(src.path(), &archive_path).unwrap();
        codec.unpack(&archive_path, dst.path()).unwrap();

        assert_eq!(
            fs::read_to_string(dst.path().join("a.txt")).unwrap(),
            "hello"
        );
    }
}
