//! Function packs
//!
//! A pack is a JSON or TOML document of functions and function tags.
//! Function bodies are lists of structured command lines; they are kept
//! as raw JSON until a call binds arguments, so `$(name)` placeholders can
//! appear anywhere in a line.
//!
//! ```json
//! {
//!   "functions": {
//!     "demo:greet": {
//!       "params": ["who"],
//!       "lines": [{ "run": { "t": "Say", "message": "hello $(who)" } }]
//!     }
//!   },
//!   "tags": { "demo:load": ["demo:greet"] }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::execution::{
    check_compound, CommandError, CommandFunction, FunctionId, FunctionRef, FunctionResolver,
    InstantiatedFunction, InstantiationError,
};

use super::compile::compile_line;
use super::source::SourceStack;

/* ===================== Errors ===================== */

#[derive(Debug, Error)]
pub enum PackError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON pack: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML pack: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported pack format for {path} (expected .json or .toml)")]
    UnsupportedFormat { path: PathBuf },

    #[error(transparent)]
    InvalidId(#[from] CommandError),

    #[error("Tag #{tag} references unknown function {member}")]
    UnknownTagMember { tag: String, member: String },
}

/* ===================== Pack Format ===================== */

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackFile {
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDef>,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDef {
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub lines: Vec<JsonValue>,
}

/// One command line: optional `execute` modifiers, then an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandLine {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ModifierSpec>,
    /// `return run`: the line's result is the function's result
    #[serde(default, rename = "return")]
    pub return_run: bool,
    pub run: ActionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ModifierSpec {
    /// Fork into one source per target entity
    As { targets: Vec<String> },
    Positioned { pos: [f64; 3] },
    In { dimension: String },
    IfScore {
        holder: String,
        objective: String,
        #[serde(default)]
        min: Option<i32>,
        #[serde(default)]
        max: Option<i32>,
    },
    IfFunction { function: String },
    UnlessFunction { function: String },
    StoreResult { holder: String, objective: String },
    StoreSuccess { holder: String, objective: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ActionSpec {
    Say { message: String },
    Value { value: i32 },
    Fail { message: String },
    Add { holder: String, objective: String, amount: i32 },
    Get { holder: String, objective: String },
    Function {
        function: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<JsonValue>,
    },
    Return { value: i32 },
    ReturnFail,
    Debug { function: String },
}

impl fmt::Display for ModifierSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierSpec::As { targets } => write!(f, "as {}", targets.join(",")),
            ModifierSpec::Positioned { pos: [x, y, z] } => write!(f, "positioned {x} {y} {z}"),
            ModifierSpec::In { dimension } => write!(f, "in {dimension}"),
            ModifierSpec::IfScore {
                holder,
                objective,
                min,
                max,
            } => {
                let bound = |b: &Option<i32>| b.map(|v| v.to_string()).unwrap_or_default();
                write!(f, "if score {holder} {objective} matches {}..{}", bound(min), bound(max))
            }
            ModifierSpec::IfFunction { function } => write!(f, "if function {function}"),
            ModifierSpec::UnlessFunction { function } => write!(f, "unless function {function}"),
            ModifierSpec::StoreResult { holder, objective } => {
                write!(f, "store result score {holder} {objective}")
            }
            ModifierSpec::StoreSuccess { holder, objective } => {
                write!(f, "store success score {holder} {objective}")
            }
        }
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionSpec::Say { message } => write!(f, "say {message}"),
            ActionSpec::Value { value } => write!(f, "value {value}"),
            ActionSpec::Fail { message } => write!(f, "fail {message}"),
            ActionSpec::Add {
                holder,
                objective,
                amount,
            } => write!(f, "scoreboard players add {holder} {objective} {amount}"),
            ActionSpec::Get { holder, objective } => {
                write!(f, "scoreboard players get {holder} {objective}")
            }
            ActionSpec::Function {
                function,
                arguments: Some(arguments),
            } => write!(f, "function {function} {arguments}"),
            ActionSpec::Function { function, .. } => write!(f, "function {function}"),
            ActionSpec::Return { value } => write!(f, "return {value}"),
            ActionSpec::ReturnFail => f.write_str("return fail"),
            ActionSpec::Debug { function } => write!(f, "debug function {function}"),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.return_run {
            f.write_str("return run ")?;
        }
        if !self.modifiers.is_empty() {
            f.write_str("execute ")?;
            for modifier in &self.modifiers {
                write!(f, "{modifier} ")?;
            }
            f.write_str("run ")?;
        }
        write!(f, "{}", self.run)
    }
}

/* ===================== Pack ===================== */

struct PackInner {
    functions: BTreeMap<FunctionId, FunctionDef>,
    tags: BTreeMap<FunctionId, Vec<FunctionId>>,
    trace_dir: PathBuf,
}

/// A loaded pack; cheap to clone and shared by every compiled line
#[derive(Clone)]
pub struct FunctionPack {
    inner: Rc<PackInner>,
}

impl FunctionPack {
    /// Load a `.json` or `.toml` pack from disk
    pub fn load(path: impl AsRef<Path>, trace_dir: impl Into<PathBuf>) -> Result<Self, PackError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: PackFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&text)?,
            Some("toml") => toml::from_str(&text)?,
            _ => {
                return Err(PackError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };
        FunctionPack::from_file(file, trace_dir)
    }

    pub fn from_json_str(text: &str) -> Result<Self, PackError> {
        FunctionPack::from_file(serde_json::from_str(text)?, std::env::temp_dir())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PackError> {
        FunctionPack::from_file(toml::from_str(text)?, std::env::temp_dir())
    }

    pub fn from_file(file: PackFile, trace_dir: impl Into<PathBuf>) -> Result<Self, PackError> {
        let functions = file
            .functions
            .into_iter()
            .map(|(id, def)| -> Result<_, PackError> { Ok((FunctionId::parse(&id)?, def)) })
            .collect::<Result<BTreeMap<_, _>, PackError>>()?;

        let mut tags = BTreeMap::new();
        for (tag, members) in file.tags {
            let tag = FunctionId::parse(&tag)?;
            let mut ids = Vec::with_capacity(members.len());
            for member in members {
                let id = FunctionId::parse(&member)?;
                if !functions.contains_key(&id) {
                    return Err(PackError::UnknownTagMember {
                        tag: tag.to_string(),
                        member,
                    });
                }
                ids.push(id);
            }
            tags.insert(tag, ids);
        }

        Ok(FunctionPack {
            inner: Rc::new(PackInner {
                functions,
                tags,
                trace_dir: trace_dir.into(),
            }),
        })
    }

    /// Directory that debug traces are written to
    pub fn trace_dir(&self) -> &Path {
        &self.inner.trace_dir
    }

    pub fn function_ids(&self) -> impl Iterator<Item = &FunctionId> {
        self.inner.functions.keys()
    }

    pub fn definition(&self, id: &FunctionId) -> Option<&FunctionDef> {
        self.inner.functions.get(id)
    }

    fn make_function(&self, id: &FunctionId) -> Option<FunctionRef<SourceStack>> {
        let def = self.inner.functions.get(id)?;
        Some(Rc::new(PackFunction {
            id: id.clone(),
            params: def.params.clone(),
            lines: def.lines.clone(),
            pack: self.clone(),
        }))
    }
}

impl FunctionResolver<SourceStack> for FunctionPack {
    fn function(&self, id: &FunctionId) -> Option<FunctionRef<SourceStack>> {
        self.make_function(id)
    }

    fn tag(&self, id: &FunctionId) -> Option<Vec<FunctionRef<SourceStack>>> {
        let members = self.inner.tags.get(id)?;
        Some(members.iter().filter_map(|member| self.make_function(member)).collect())
    }
}

/* ===================== Functions ===================== */

/// A pack function; with `params` it is a macro function
pub struct PackFunction {
    id: FunctionId,
    params: Vec<String>,
    lines: Vec<JsonValue>,
    pack: FunctionPack,
}

impl PackFunction {
    pub fn is_macro(&self) -> bool {
        !self.params.is_empty()
    }

    fn bind(&self, arguments: Option<&JsonValue>) -> Result<Vec<JsonValue>, InstantiationError> {
        let arguments = check_compound(arguments)?;
        if !self.is_macro() {
            return Ok(self.lines.clone());
        }

        let missing: Vec<String> = self
            .params
            .iter()
            .filter(|param| !arguments.is_some_and(|map| map.contains_key(param.as_str())))
            .cloned()
            .collect();
        let Some(arguments) = arguments.filter(|_| missing.is_empty()) else {
            return Err(InstantiationError::MissingArguments { names: missing });
        };

        let bindings: Vec<(String, &JsonValue)> = self
            .params
            .iter()
            .filter_map(|param| arguments.get(param).map(|value| (format!("$({param})"), value)))
            .collect();
        Ok(self
            .lines
            .iter()
            .map(|line| substitute(line, &bindings))
            .collect())
    }
}

impl CommandFunction<SourceStack> for PackFunction {
    fn id(&self) -> &FunctionId {
        &self.id
    }

    fn instantiate(
        &self,
        arguments: Option<&JsonValue>,
    ) -> Result<InstantiatedFunction<SourceStack>, InstantiationError> {
        let entries = self
            .bind(arguments)?
            .into_iter()
            .enumerate()
            .map(|(index, raw)| -> Result<_, InstantiationError> {
                let line: CommandLine =
                    serde_json::from_value(raw).map_err(|error| InstantiationError::InvalidLine {
                        line: index + 1,
                        message: error.to_string(),
                    })?;
                Ok(compile_line(&line, &self.pack))
            })
            .collect::<Result<Vec<_>, InstantiationError>>()?;
        Ok(InstantiatedFunction::new(self.id.clone(), entries))
    }
}

/// Replace `$(name)` placeholders in every string of `value`
///
/// A string that is exactly one placeholder takes the argument's value
/// as-is, so numbers stay numbers.
fn substitute(value: &JsonValue, bindings: &[(String, &JsonValue)]) -> JsonValue {
    match value {
        JsonValue::String(text) => {
            if let Some((_, bound)) = bindings.iter().find(|(key, _)| key == text) {
                return (*bound).clone();
            }
            let mut out = text.clone();
            for (key, bound) in bindings {
                if out.contains(key.as_str()) {
                    let rendered = match bound {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    out = out.replace(key.as_str(), &rendered);
                }
            }
            JsonValue::String(out)
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|item| substitute(item, bindings)).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), substitute(item, bindings)))
                .collect(),
        ),
        other => other.clone(),
    }
}
