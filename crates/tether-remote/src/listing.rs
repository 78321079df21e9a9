//! Directory listing helpers
//!
//! Conversion of raw SFTP entries into [`RemoteFile`] values, plus the
//! presentation ordering: directories first, then case-insensitive name
//! order.

use std::cmp::Ordering;

use russh_sftp::protocol::FileAttributes;

use tether_core::RemoteFile;

/// File-type mask and directory bit of the Unix permission word
const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// Classify an entry as a directory from its permission bits
pub fn is_directory(permissions: Option<u32>) -> bool {
    permissions.is_some_and(|bits| bits & S_IFMT == S_IFDIR)
}

/// Build a [`RemoteFile`] from one listing entry
pub fn remote_file(parent: &str, name: &str, attrs: &FileAttributes) -> RemoteFile {
    RemoteFile {
        name: name.to_string(),
        path: join_remote_path(parent, name),
        is_directory: is_directory(attrs.permissions),
        size: attrs.size.unwrap_or(0),
        modified: attrs.mtime.map(u64::from),
    }
}

/// Sort directories first, then case-insensitively by name
pub fn sort_entries(entries: &mut [RemoteFile]) {
    entries.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
}

/// Join a child name onto a remote directory path
pub fn join_remote_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// The parent directory of a remote path ("/" for top-level entries)
pub fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(index) => path[..index].to_string(),
        None => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            path: format!("/home/dev/{}", name),
            is_directory: is_dir,
            size: 0,
            modified: None,
        }
    }

    #[test]
    fn test_is_directory_from_permission_bits() {
        assert!(is_directory(Some(0o040755)));
        assert!(!is_directory(Some(0o100644)));
        assert!(!is_directory(None));
    }

    #[test]
    fn test_sort_directories_first_then_case_insensitive() {
        let mut entries = vec![
            entry("zeta.txt", false),
            entry("Alpha", true),
            entry("beta.txt", false),
            entry("gamma", true),
            entry("Beta.txt", false),
        ];
        sort_entries(&mut entries);

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "gamma", "beta.txt", "Beta.txt", "zeta.txt"]);
    }

    #[test]
    fn test_remote_file_from_attributes() {
        let attrs = FileAttributes {
            size: Some(512),
            permissions: Some(0o040755),
            mtime: Some(1_700_000_000),
            ..Default::default()
        };
        let file = remote_file("/home/dev", "projects", &attrs);
        assert_eq!(file.path, "/home/dev/projects");
        assert!(file.is_directory);
        assert_eq!(file.size, 512);
        assert_eq!(file.modified, Some(1_700_000_000));
    }

    #[test]
    fn test_join_remote_path_root() {
        assert_eq!(join_remote_path("/", "etc"), "/etc");
        assert_eq!(join_remote_path("/home/dev", "a.txt"), "/home/dev/a.txt");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/home/dev/a.txt"), "/home/dev");
        assert_eq!(parent_path("/etc"), "/");
        assert_eq!(parent_path("relative"), "/");
    }
}
