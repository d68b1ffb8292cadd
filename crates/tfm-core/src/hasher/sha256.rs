use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

const READ_BUFFER_LEN: usize = 8192;

/// Cheap pre-filter digest: SHA-256 over the first and last `chunk_len` bytes.
/// Files no larger than two chunks are hashed whole, so for them the partial
/// hash equals the full hash.
pub fn partial_hash(file: &Path, chunk_len: usize, file_size: u64) -> io::Result<String> {
    let chunk_len = chunk_len.max(1);
    if file_size <= 2 * chunk_len as u64 {
        return full_hash(file);
    }

    let mut f = File::open(file)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; chunk_len];

    f.read_exact(&mut buffer)?;
    hasher.update(&buffer);

    f.seek(SeekFrom::End(-(chunk_len as i64)))?;
    f.read_exact(&mut buffer)?;
    hasher.update(&buffer);

    Ok(format!("{:x}", hasher.finalize()))
}

/// Streaming SHA-256 of the whole file, as lowercase hex.
pub fn full_hash(file: &Path) -> io::Result<String> {
    let mut f = File::open(file)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; READ_BUFFER_LEN];
    loop {
        let n = f.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_full_hash_known_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            full_hash(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_small_file_partial_equals_full() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.bin");
        fs::write(&path, vec![7u8; 100]).unwrap();
        assert_eq!(partial_hash(&path, 64, 100).unwrap(), full_hash(&path).unwrap());
    }

    #[test]
    fn test_partial_hash_ignores_middle_bytes() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");

        let mut content_a = vec![0u8; 300];
        let mut content_b = vec![0u8; 300];
        content_a[150] = 1;
        content_b[150] = 2;
        fs::write(&a, &content_a).unwrap();
        fs::write(&b, &content_b).unwrap();

        assert_eq!(partial_hash(&a, 64, 300).unwrap(), partial_hash(&b, 64, 300).unwrap());
        assert_ne!(full_hash(&a).unwrap(), full_hash(&b).unwrap());
    }

    #[test]
    fn test_partial_hash_sees_tail() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");

        let mut content_b = vec![0u8; 300];
        content_b[299] = 9;
        fs::write(&a, vec![0u8; 300]).unwrap();
        fs::write(&b, &content_b).unwrap();

        assert_ne!(partial_hash(&a, 64, 300).unwrap(), partial_hash(&b, 64, 300).unwrap());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(full_hash(&dir.path().join("missing")).is_err());
    }
}
