//! Finding the source files of a project.

use ignore::WalkBuilder;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Extension of analyzed files when none is given.
pub const DEFAULT_EXTENSION: &str = "cs";

/// Build output directories, never analyzed.
const SKIPPED_DIRS: &[&str] = &["bin", "obj"];

lazy_static! {
    static ref COMPILE_ITEM: Regex =
        Regex::new(r#"<Compile\s+Include\s*=\s*"([^"]+)""#).expect("static pattern");
    static ref SDK_ATTRIBUTE: Regex =
        Regex::new(r#"<Project[^>]*\sSdk\s*="#).expect("static pattern");
}

/// Source files of the project at `path`, sorted by path.
///
/// A directory contributes every file below it with one of `extensions`.
/// A `.csproj` file contributes its `Compile` items if it is an old-style
/// project listing them, and otherwise the files below its directory. Any
/// other file is a project of its own.
pub fn discover(path: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = if path.is_dir() {
        walk(path, extensions)?
    } else if path.extension() == Some(OsStr::new("csproj")) {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let dir = path.parent().unwrap_or(Path::new(""));
        match compile_items(&text) {
            Some(items) => {
                debug!("Using {} explicit items of {}", items.len(), path.display());
                items.iter().map(|item| dir.join(item)).collect()
            }
            None => walk(dir, extensions)?,
        }
    } else {
        vec![path.to_path_buf()]
    };
    files.sort();
    files.dedup();
    info!("Found {} source files", files.len());
    Ok(files)
}

/// `Compile` items of an old-style project, with `\` separators normalized.
/// `None` for SDK-style projects and projects without items.
fn compile_items(project: &str) -> Option<Vec<String>> {
    if SDK_ATTRIBUTE.is_match(project) {
        return None;
    }
    let items: Vec<String> = COMPILE_ITEM
        .captures_iter(project)
        .map(|c| c[1].replace('\\', "/"))
        .collect();
    (!items.is_empty()).then_some(items)
}

fn walk(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let root = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let walker = WalkBuilder::new(root)
        .filter_entry(|entry| {
            let skipped = entry.depth() > 0
                && entry.file_type().is_some_and(|t| t.is_dir())
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            !skipped
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == Some(0) => return Err(err.into()),
            Err(err) => {
                warn!("Skipping project entry: {}", err);
                continue;
            }
        };
        let is_file = entry.file_type().is_some_and(|t| t.is_file());
        let analyzed = entry
            .path()
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| extensions.iter().any(|e| e == ext));
        if is_file && analyzed {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fresh scratch directory for one test.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "surface-area-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(dir: &Path, path: &str, content: &str) {
        let path = dir.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relative(dir: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|f| f.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn cs() -> Vec<String> {
        vec![DEFAULT_EXTENSION.to_string()]
    }

    #[test]
    fn directory() {
        let dir = scratch("directory");
        touch(&dir, "b.cs", "");
        touch(&dir, "a/c.cs", "");
        touch(&dir, "a/readme.md", "");
        touch(&dir, "bin/Debug/gen.cs", "");
        touch(&dir, "obj/gen.cs", "");
        let files = discover(&dir, &cs()).unwrap();
        assert_eq!(relative(&dir, files), vec!["a/c.cs", "b.cs"]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn extensions() {
        let dir = scratch("extensions");
        touch(&dir, "a.cs", "");
        touch(&dir, "b.csx", "");
        let files = discover(&dir, &["csx".to_string(), "cs".to_string()]).unwrap();
        assert_eq!(relative(&dir, files), vec!["a.cs", "b.csx"]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn old_style_project() {
        let dir = scratch("old-style");
        touch(&dir, "One.cs", "");
        touch(&dir, "Sub/Two.cs", "");
        touch(&dir, "Unlisted.cs", "");
        touch(
            &dir,
            "App.csproj",
            r#"<Project ToolsVersion="15.0">
  <ItemGroup>
    <Compile Include="Sub\Two.cs" />
    <Compile Include="One.cs" />
  </ItemGroup>
</Project>"#,
        );
        let files = discover(&dir.join("App.csproj"), &cs()).unwrap();
        assert_eq!(relative(&dir, files), vec!["One.cs", "Sub/Two.cs"]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn sdk_project() {
        let dir = scratch("sdk");
        touch(&dir, "One.cs", "");
        touch(&dir, "Sub/Two.cs", "");
        touch(&dir, "obj/Gen.cs", "");
        touch(
            &dir,
            "App.csproj",
            r#"<Project Sdk="Microsoft.NET.Sdk"><ItemGroup><Compile Include="Extra.cs" /></ItemGroup></Project>"#,
        );
        let files = discover(&dir.join("App.csproj"), &cs()).unwrap();
        assert_eq!(relative(&dir, files), vec!["One.cs", "Sub/Two.cs"]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn single_file() {
        let files = discover(Path::new("Foo.cs"), &cs()).unwrap();
        assert_eq!(files, vec![PathBuf::from("Foo.cs")]);
    }

    #[test]
    fn missing_project_file() {
        let err = discover(Path::new("/nonexistent/App.csproj"), &cs()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn compile_item_parsing() {
        assert_eq!(
            compile_items(r#"<Project><Compile Include="A\B.cs"/></Project>"#),
            Some(vec!["A/B.cs".to_string()])
        );
        assert_eq!(compile_items("<Project></Project>"), None);
        assert_eq!(
            compile_items(r#"<Project Sdk="X"><Compile Include="A.cs"/></Project>"#),
            None
        );
    }
}
