use anyhow::{Context, Result};
use policy_runner_core::{Error, PolicyEngine, PolicySet, PreparedQuery};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, trace};

/// Loads Rego policy sets with [`regorus`].
#[derive(Clone, Debug, Default)]
pub struct RegoEngine(());

/// A Rego query over a loaded set of policy modules.
pub struct RegoQuery {
    engine: regorus::Engine,
    query: String,
}

// === impl RegoEngine ===

impl RegoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(policy_set: &PolicySet) -> Result<regorus::Engine> {
        let files = policy_files(policy_set)?;
        anyhow::ensure!(
            !files.is_empty(),
            "no policy files found in {}",
            policy_set.path
        );

        let mut engine = regorus::Engine::new();
        for file in &files {
            trace!(file = %file.display(), "Loading");
            let rego = fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            engine
                .add_policy(file.display().to_string(), qualify_imported_calls(&rego))
                .with_context(|| format!("failed to load {}", file.display()))?;
        }
        debug!(files = files.len(), "Loaded policy files");
        Ok(engine)
    }
}

impl PolicyEngine for RegoEngine {
    type Query = RegoQuery;

    fn prepare(&self, policy_set: &PolicySet) -> Result<RegoQuery, Error> {
        let compile = |source| Error::Compile {
            policy_set: policy_set.name.clone(),
            source,
        };
        let engine = Self::load(policy_set).map_err(compile)?;
        let mut query = RegoQuery {
            engine,
            query: policy_set.query.clone(),
        };
        query
            .check()
            .with_context(|| format!("invalid query {}", policy_set.query))
            .map_err(compile)?;
        Ok(query)
    }
}

// === impl RegoQuery ===

impl RegoQuery {
    /// Evaluates the query once against an empty object, so that syntax
    /// errors and unresolved functions fail before any object is scanned.
    fn check(&mut self) -> Result<()> {
        let empty = serde_json::Value::Object(serde_json::Map::new());
        self.eval(&empty).map(drop)
    }
}

impl PreparedQuery for RegoQuery {
    fn eval(&mut self, input: &serde_json::Value) -> Result<Vec<serde_json::Value>> {
        let input = regorus::Value::from_json_str(&input.to_string())?;
        self.engine.set_input(input);
        let results = self.engine.eval_query(self.query.clone(), false)?;
        results
            .result
            .into_iter()
            .flat_map(|result| result.expressions)
            .map(|expr| serde_json::to_value(&expr.value).map_err(Into::into))
            .collect()
    }
}

/// Rewrites calls through an imported package, such as `konstraint.f(x)`
/// after `import data.lib.konstraint`, to the function's full `data.` path.
/// regorus only resolves functions of other packages by their full path.
fn qualify_imported_calls(rego: &str) -> String {
    let imports = imports(rego);
    if imports.is_empty() {
        return rego.to_string();
    }

    let chars = rego.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(rego.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            quote @ ('"' | '`') => {
                out.push(quote);
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    out.push(c);
                    i += 1;
                    if c == quote {
                        break;
                    }
                    if c == '\\' && quote == '"' && i < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    }
                }
            }
            c if is_ident_start(c) && !follows_ident(&chars[..i]) => {
                let start = i;
                while i < chars.len() && is_ident(chars[i]) {
                    i += 1;
                }
                let word = chars[start..i].iter().collect::<String>();
                match imports.iter().find(|(alias, _)| *alias == word) {
                    Some((_, path)) if is_call(&chars[i..]) => out.push_str(path),
                    _ => out.push_str(&word),
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Lists `(alias, path)` for each `import data...` in a module.
fn imports(rego: &str) -> Vec<(String, String)> {
    rego.lines()
        .filter_map(|line| {
            let mut words = line.split('#').next()?.split_whitespace();
            if words.next()? != "import" {
                return None;
            }
            let path = words.next()?;
            if !path.starts_with("data.") {
                return None;
            }
            let alias = match (words.next(), words.next()) {
                (Some("as"), Some(alias)) => alias,
                _ => path.rsplit('.').next()?,
            };
            Some((alias.to_string(), path.to_string()))
        })
        .collect()
}

/// Whether the text following an identifier is `.name(`.
fn is_call(rest: &[char]) -> bool {
    match rest.split_first() {
        Some((&'.', rest)) => {
            let len = rest.iter().take_while(|c| is_ident(**c)).count();
            len > 0 && rest.get(len) == Some(&'(')
        }
        _ => false,
    }
}

/// Whether an identifier starting here continues a word or a ref.
fn follows_ident(before: &[char]) -> bool {
    before.last().is_some_and(|&c| is_ident(c) || c == '.')
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lists the `.rego` files under the policy set's path, skipping excluded
/// paths. An excluded directory is not descended into.
fn policy_files(policy_set: &PolicySet) -> Result<Vec<PathBuf>> {
    let root = Path::new(&policy_set.path);
    let mut files = Vec::new();
    if root.is_file() {
        if !policy_set.is_excluded(root) {
            files.push(root.to_path_buf());
        }
    } else {
        collect(root, policy_set, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect(dir: &Path, policy_set: &PolicySet, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if policy_set.is_excluded(&path) {
            trace!(path = %path.display(), "Excluded");
            continue;
        }
        if path.is_dir() {
            collect(&path, policy_set, files)?;
        } else if path.extension().is_some_and(|ext| ext == "rego") {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> String {
        format!("{}/tests/fixtures/ocp", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn walks_policy_directory() {
        let set = PolicySet {
            path: fixtures(),
            ..Default::default()
        };
        let files = policy_files(&set).unwrap();
        let names = files
            .iter()
            .map(|f| f.strip_prefix(fixtures()).unwrap().display().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "bestpractices/container-image-latest/src.rego",
                "bestpractices/container-image-latest/src_test.rego",
                "bestpractices/container-resources-limits-memory-notset/src.rego",
                "lib/konstraint.rego",
            ]
        );
    }

    #[test]
    fn skips_excluded_paths() {
        let set = PolicySet {
            path: fixtures(),
            exclude_substrings: vec!["_test.rego".to_string(), "memory".to_string()],
            ..Default::default()
        };
        let files = policy_files(&set).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| !set.is_excluded(f)));
    }

    #[test]
    fn missing_path_fails_to_prepare() {
        let set = PolicySet {
            name: "bestpractices".to_string(),
            path: format!("{}/does-not-exist", fixtures()),
            query: "data.ocp.bestpractices".to_string(),
            ..Default::default()
        };
        let err = RegoEngine::new()
            .prepare(&set)
            .err()
            .expect("path is missing");
        assert!(matches!(err, Error::Compile { ref policy_set, .. } if policy_set == "bestpractices"));
    }

    #[test]
    fn qualifies_calls_through_imports() {
        let rego = r#"package ocp.bestpractices.example

import data.lib.konstraint
import data.lib.kubernetes as k8s

# konstraint.pod_containers(input) in a comment is kept
violation contains result if {
	containers := konstraint.pod_containers(input)
	k8s.is_pod(input)
	msg := sprintf("konstraint.format(%s)", [konstraint.name])
	result := konstraint.format_with_id(msg, "ID-1")
}
"#;
        assert_eq!(
            qualify_imported_calls(rego),
            r#"package ocp.bestpractices.example

import data.lib.konstraint
import data.lib.kubernetes as k8s

# konstraint.pod_containers(input) in a comment is kept
violation contains result if {
	containers := data.lib.konstraint.pod_containers(input)
	data.lib.kubernetes.is_pod(input)
	msg := sprintf("konstraint.format(%s)", [konstraint.name])
	result := data.lib.konstraint.format_with_id(msg, "ID-1")
}
"#
        );
    }

    #[test]
    fn modules_without_imports_are_unchanged() {
        let rego = "package lib.konstraint\n\nformat(msg) := {\"msg\": msg}\n";
        assert_eq!(qualify_imported_calls(rego), rego);
    }

    #[test]
    fn resolves_library_functions() {
        let set = PolicySet {
            name: "bestpractices".to_string(),
            path: fixtures(),
            exclude_substrings: vec!["_test.rego".to_string()],
            query: "data.ocp.bestpractices".to_string(),
            ..Default::default()
        };
        let mut query = RegoEngine::new()
            .prepare(&set)
            .expect("library functions must resolve");
        let results = query
            .eval(&serde_json::json!({
                "kind": "Pod",
                "metadata": { "name": "web" },
                "spec": { "containers": [{ "name": "web", "image": "nginx:latest" }] },
            }))
            .expect("query must evaluate");
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0]["container_image_latest"]["violation"][0]["details"]["policyID"],
            "RHCOP-OCP_BESTPRACT-00005"
        );
    }

    #[test]
    fn malformed_query_fails_to_prepare() {
        let set = PolicySet {
            name: "bestpractices".to_string(),
            path: fixtures(),
            exclude_substrings: vec!["_test.rego".to_string()],
            query: "data.ocp.bestpractices[[[ ((".to_string(),
            ..Default::default()
        };
        let err = RegoEngine::new()
            .prepare(&set)
            .err()
            .expect("query does not parse");
        assert!(matches!(err, Error::Compile { .. }));
    }

    #[test]
    fn unresolved_function_fails_to_prepare() {
        let set = PolicySet {
            name: "bestpractices".to_string(),
            path: format!("{}/tests/fixtures/unresolved", env!("CARGO_MANIFEST_DIR")),
            query: "data.unresolved".to_string(),
            ..Default::default()
        };
        let err = RegoEngine::new()
            .prepare(&set)
            .err()
            .expect("function is not defined");
        assert!(matches!(err, Error::Compile { .. }));
    }

    #[test]
    fn everything_excluded_fails_to_prepare() {
        let set = PolicySet {
            name: "bestpractices".to_string(),
            path: fixtures(),
            exclude_substrings: vec![".rego".to_string()],
            query: "data.ocp.bestpractices".to_string(),
            ..Default::default()
        };
        assert!(RegoEngine::new().prepare(&set).is_err());
    }
}
