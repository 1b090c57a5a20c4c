//! SPIR-V shader loading.

use crate::error::{GpuError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Vertex and fragment SPIR-V files sharing a stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPair {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderPair {
    /// `<dir>/<stem>.vert.spv` and `<dir>/<stem>.frag.spv`.
    pub fn from_stem(dir: &Path, stem: &str) -> Self {
        Self {
            vertex: dir.join(format!("{stem}.vert.spv")),
            fragment: dir.join(format!("{stem}.frag.spv")),
        }
    }

    /// Read both stages.
    pub fn load(&self) -> Result<(Vec<u32>, Vec<u32>)> {
        Ok((load_spirv(&self.vertex)?, load_spirv(&self.fragment)?))
    }
}

/// Read a SPIR-V binary into aligned words.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let wrap = |source| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(wrap)?;
    ash::util::read_spv(&mut file).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pair_paths_follow_stem() {
        let pair = ShaderPair::from_stem(Path::new("shaders"), "base_triangle_2d");
        assert_eq!(pair.vertex, Path::new("shaders/base_triangle_2d.vert.spv"));
        assert_eq!(pair.fragment, Path::new("shaders/base_triangle_2d.frag.spv"));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("definitely/not/here.vert.spv");
        match load_spirv(path) {
            Err(GpuError::ShaderLoad { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn reads_words_from_disk() {
        let path = std::env::temp_dir().join(format!("qoal-shader-{}.spv", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            // SPIR-V magic followed by one more word
            file.write_all(&[0x03, 0x02, 0x23, 0x07, 1, 0, 0, 0]).unwrap();
        }
        let words = load_spirv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(words, vec![0x0723_0203, 1]);
    }

    #[test]
    fn misaligned_file_rejected() {
        let path = std::env::temp_dir().join(format!("qoal-bad-{}.spv", std::process::id()));
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let result = load_spirv(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(GpuError::ShaderLoad { .. })));
    }
}
