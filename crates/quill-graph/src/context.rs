//! Synthetic directory-glob ("context") modules.
//!
//! A `require.context(dir, recursive, filter)` call produces a dependency on
//! a synthetic module whose contents enumerate every file under `dir` that
//! matches the filter. The graph engine only needs to give each distinct
//! parameter combination a stable synthetic path and to decide whether a
//! changed file falls inside a context; generating the module body is the
//! transformer's job.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use regex::Regex;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

/// How the matched files are required at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    Sync,
    Eager,
    Lazy,
    LazyOnce,
}

/// Filter over paths relative to the context directory, expressed as a
/// regular expression source string so it can travel inside dependency data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextFilter {
    pub pattern: String,
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Parameters of a `require.context` call, as reported by the transformer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequireContextParams {
    pub recursive: bool,
    pub filter: ContextFilter,
    pub mode: ContextMode,
}

/// A resolved context: the absolute directory plus a compiled filter. Stored
/// in graph private state and handed back to the transformer whenever the
/// synthetic module is (re)transformed.
#[derive(Debug, Clone)]
pub struct RequireContext {
    /// Absolute path of the directory the context enumerates.
    pub from: PathBuf,
    pub recursive: bool,
    pub filter: Regex,
    pub mode: ContextMode,
}

/// Derive the synthetic absolute path for a context dependency.
///
/// Two `require.context` calls against the same directory with different
/// parameters must map to different modules, so the parameter hash is baked
/// into the path.
pub fn derive_absolute_path_from_context(from: &Path, params: &RequireContextParams) -> PathBuf {
    let mut hasher = FxHasher::default();
    params.hash(&mut hasher);
    let digest = hasher.finish();
    let mut path = from.as_os_str().to_owned();
    path.push(format!("?ctx={digest:016x}"));
    PathBuf::from(path)
}

/// Whether `file_path` is part of the set of files a context enumerates.
pub fn file_matches_context(file_path: &Path, context: &RequireContext) -> bool {
    let Ok(relative) = file_path.strip_prefix(&context.from) else {
        return false;
    };
    if relative.as_os_str().is_empty() {
        return false;
    }
    let Some(relative) = relative.to_str() else {
        return false;
    };
    if !context.recursive && relative.contains('/') {
        return false;
    }
    // Filters are written against "./relative/path", matching the runtime API.
    context.filter.is_match(&format!("./{relative}"))
}

/// Compile the filter of a context parameter set.
pub(crate) fn compile_context_filter(params: &RequireContextParams) -> Result<Regex, regex::Error> {
    let mut builder = regex::RegexBuilder::new(&params.filter.pattern);
    builder.case_insensitive(params.filter.case_insensitive);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pattern: &str, recursive: bool) -> RequireContextParams {
        RequireContextParams {
            recursive,
            filter: ContextFilter {
                pattern: pattern.to_string(),
                case_insensitive: false,
            },
            mode: ContextMode::Sync,
        }
    }

    fn context(from: &str, pattern: &str, recursive: bool) -> RequireContext {
        let params = params(pattern, recursive);
        RequireContext {
            from: PathBuf::from(from),
            recursive,
            filter: compile_context_filter(&params).unwrap(),
            mode: ContextMode::Sync,
        }
    }

    #[test]
    fn synthetic_path_is_stable_and_parameter_sensitive() {
        let from = Path::new("/project/pages");
        let a = derive_absolute_path_from_context(from, &params(r"\.js$", true));
        let b = derive_absolute_path_from_context(from, &params(r"\.js$", true));
        let c = derive_absolute_path_from_context(from, &params(r"\.js$", false));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.to_string_lossy().starts_with("/project/pages?ctx="));
    }

    #[test]
    fn matches_files_under_the_directory() {
        let ctx = context("/project/pages", r"\.js$", true);
        assert!(file_matches_context(Path::new("/project/pages/home.js"), &ctx));
        assert!(file_matches_context(
            Path::new("/project/pages/admin/users.js"),
            &ctx
        ));
        assert!(!file_matches_context(Path::new("/project/src/home.js"), &ctx));
        assert!(!file_matches_context(
            Path::new("/project/pages/readme.md"),
            &ctx
        ));
    }

    #[test]
    fn non_recursive_contexts_ignore_subdirectories() {
        let ctx = context("/project/pages", r"\.js$", false);
        assert!(file_matches_context(Path::new("/project/pages/home.js"), &ctx));
        assert!(!file_matches_context(
            Path::new("/project/pages/admin/users.js"),
            &ctx
        ));
    }
}
