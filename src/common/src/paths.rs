//! Normalization of dataset locations into [`DatasetIdentifier`]s.

use std::path::Path;

use url::Url;

use crate::DatasetIdentifier;

/// Identifier of a dataset stored at `url`.
///
/// Local files use the bare scheme as namespace (`file`) and the decoded
/// absolute path as name. Remote stores use `scheme://authority` as namespace
/// and the path without its leading `/` as name.
pub fn from_url(url: &Url) -> DatasetIdentifier {
    let scheme = url.scheme();
    if scheme == "file" {
        let path = url
            .to_file_path()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_else(|_| url.path().to_string());
        return DatasetIdentifier::new(scheme, normalize_path(&path));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let namespace = match url.port() {
                Some(port) => format!("{scheme}://{host}:{port}"),
                None => format!("{scheme}://{host}"),
            };
            let name = normalize_path(url.path());
            let name = name.strip_prefix('/').unwrap_or(&name);
            DatasetIdentifier::new(namespace, name)
        }
        _ => DatasetIdentifier::new(scheme, normalize_path(url.path())),
    }
}

/// Identifier of a dataset stored at `location`, which is either a URL or a
/// bare path. Bare paths are resolved against the working directory and
/// placed in `default_scheme`. A blank location names no dataset.
pub fn from_location(location: &str, default_scheme: &str) -> Option<DatasetIdentifier> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    Some(match Url::parse(location) {
        // `C:\data` parses as a URL with scheme `c`
        Ok(url) if url.scheme().len() > 1 => from_url(&url),
        _ => from_path(Path::new(location), default_scheme),
    })
}

/// Identifier of a local path in `scheme`.
pub fn from_path(path: &Path, scheme: &str) -> DatasetIdentifier {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    DatasetIdentifier::new(scheme, normalize_path(&absolute.to_string_lossy()))
}

/// Identifier of a catalog table known only by its qualified name.
pub fn from_table_name(namespace: &str, qualified_name: &str) -> DatasetIdentifier {
    DatasetIdentifier::new(namespace, qualified_name)
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths_and_file_urls_agree() {
        let cases = [
            ("/data/out", "/data/out"),
            ("/data/out/", "/data/out"),
            ("file:///data/out", "/data/out"),
            ("file:///data/out/", "/data/out"),
            ("file:///data/my%20dir/", "/data/my dir"),
            ("/data/my dir", "/data/my dir"),
        ];

        for (location, name) in cases {
            let identifier = from_location(location, "file").unwrap();
            assert_eq!(identifier.namespace(), "file", "{location}");
            assert_eq!(identifier.name(), name, "{location}");
        }
    }

    #[test]
    fn file_url_with_authority_keeps_path() {
        let identifier = from_location("file://tmp/some-uri", "file").unwrap();
        assert_eq!(identifier, DatasetIdentifier::new("file", "/some-uri"));
    }

    #[test]
    fn remote_stores_use_authority_namespace() {
        let cases = [
            ("s3://bucket/warehouse/orders/", "s3://bucket", "warehouse/orders"),
            ("gs://bucket/a/b", "gs://bucket", "a/b"),
            ("hdfs://namenode:8020/user/hive", "hdfs://namenode:8020", "user/hive"),
        ];

        for (location, namespace, name) in cases {
            let identifier = from_location(location, "file").unwrap();
            assert_eq!(identifier, DatasetIdentifier::new(namespace, name), "{location}");
        }
    }

    #[test]
    fn relative_paths_become_absolute() {
        let identifier = from_location("relative/dir", "file").unwrap();
        assert!(Path::new(identifier.name()).is_absolute());
        assert!(identifier.name().ends_with("relative/dir"));
    }

    #[test]
    fn root_stays_root() {
        assert_eq!(from_location("/", "file").unwrap().name(), "/");
        assert_eq!(from_location("file:///", "file").unwrap().name(), "/");
    }

    #[test]
    fn default_scheme_applies_to_bare_paths() {
        let identifier = from_location("/warehouse/t", "hdfs").unwrap();
        assert_eq!(identifier, DatasetIdentifier::new("hdfs", "/warehouse/t"));
    }

    #[test]
    fn blank_locations_name_nothing() {
        assert_eq!(from_location("", "file"), None);
        assert_eq!(from_location("   ", "file"), None);
    }
}
