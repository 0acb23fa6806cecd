//! StepAction fixture layout: one `<name>.yaml` at the top of the directory and
//! optional test manifests under `tests/*.yaml`.

use std::path::{Path, PathBuf};

use ctk_core::{Error, Result};
use tracing::{debug, info};

use crate::manifest::Manifest;
use crate::suffix::{suffix_step_action, suffix_test_manifest, suffixed};

/// A fixture copied into a work directory with the uniqueness suffix applied.
#[derive(Clone, Debug)]
pub struct StagedFixture {
    pub dir: PathBuf,
    pub step_action: PathBuf,
    /// Suffixed StepAction name, as referenced by the staged tests.
    pub step_action_name: String,
    pub tests: Vec<PathBuf>,
    pub suffix: String,
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let base = dir.to_str().ok_or_else(|| Error::Parse(format!("non UTF-8 path: {}", dir.display())))?;
    let pattern = format!("{}/*.yaml", glob::Pattern::escape(base));
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| Error::Parse(e.to_string()))? {
        files.push(entry.map_err(|e| Error::Io(e.into_error()))?);
    }
    files.sort();
    Ok(files)
}

/// The single StepAction YAML of a fixture directory.
pub fn step_action_file(dir: &Path) -> Result<PathBuf> {
    let mut files = yaml_files(dir)?;
    match files.len() {
        0 => Err(Error::Parse(format!("no YAML file found in {}", dir.display()))),
        1 => Ok(files.remove(0)),
        n => Err(Error::Parse(format!("{n} YAML files found in {}, expected exactly one", dir.display()))),
    }
}

pub fn test_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let tests = dir.join("tests");
    if !tests.is_dir() {
        return Ok(Vec::new());
    }
    yaml_files(&tests)
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| Error::Parse(format!("not a file: {}", path.display())))
}

/// Copies `src` into `work` and renames everything with `suffix`.
pub fn stage_fixture(src: &Path, work: &Path, suffix: &str) -> Result<StagedFixture> {
    let source = step_action_file(src)?;
    let mut manifest = Manifest::load(&source)?;
    let original = match suffix_step_action(&mut manifest, suffix) {
        Some(name) => name,
        None => source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Parse(format!("cannot name StepAction in {}", source.display())))?,
    };

    std::fs::create_dir_all(work)?;
    let step_action = work.join(file_name(&source)?);
    manifest.save(&step_action)?;

    let mut tests = Vec::new();
    let sources = test_files(src)?;
    if !sources.is_empty() {
        std::fs::create_dir_all(work.join("tests"))?;
    }
    for path in sources {
        let mut test = Manifest::load(&path)?;
        suffix_test_manifest(&mut test, &original, suffix);
        let staged = work.join("tests").join(file_name(&path)?);
        test.save(&staged)?;
        debug!(from = %path.display(), to = %staged.display(), "staged test manifest");
        tests.push(staged);
    }

    let step_action_name = suffixed(&original, suffix);
    info!(step_action = %step_action_name, tests = tests.len(), dir = %work.display(), "fixture staged");
    Ok(StagedFixture { dir: work.to_path_buf(), step_action, step_action_name, tests, suffix: suffix.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::doc_name;
    use std::fs;

    fn fixture(root: &Path) {
        fs::create_dir_all(root.join("tests")).unwrap();
        fs::write(root.join("git-clone.yaml"), "kind: StepAction\nmetadata:\n  name: git-clone\n").unwrap();
        fs::write(
            root.join("tests/run.yaml"),
            "kind: TaskRun\nmetadata:\n  name: clone-run\nspec:\n  taskSpec:\n    steps:\n      - name: s\n        ref:\n          name: git-clone\n",
        )
        .unwrap();
        fs::write(root.join("tests/README.md"), "ignored").unwrap();
    }

    #[test]
    fn stages_and_suffixes() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        fixture(src.path());

        let staged = stage_fixture(src.path(), work.path(), "q1w2e").unwrap();
        assert_eq!(staged.step_action_name, "git-clone-q1w2e");
        assert_eq!(staged.tests.len(), 1);

        let sa = Manifest::load(&staged.step_action).unwrap();
        assert_eq!(doc_name(&sa.docs[0]), Some("git-clone-q1w2e"));
        let run = Manifest::load(&staged.tests[0]).unwrap();
        assert_eq!(doc_name(&run.docs[0]), Some("clone-run-q1w2e"));
        assert_eq!(run.docs[0]["spec"]["taskSpec"]["steps"][0]["ref"]["name"].as_str(), Some("git-clone-q1w2e"));

        // the source fixture is untouched
        let original = fs::read_to_string(src.path().join("git-clone.yaml")).unwrap();
        assert!(original.contains("name: git-clone\n"));
    }

    #[test]
    fn requires_exactly_one_step_action() {
        let dir = tempfile::tempdir().unwrap();
        assert!(step_action_file(dir.path()).unwrap_err().to_string().contains("no YAML file"));
        fs::write(dir.path().join("a.yaml"), "kind: StepAction\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "kind: StepAction\n").unwrap();
        assert!(step_action_file(dir.path()).unwrap_err().to_string().contains("expected exactly one"));
    }

    #[test]
    fn missing_tests_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(test_files(dir.path()).unwrap().is_empty());
    }
}
