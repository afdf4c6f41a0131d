//! Shared helpers for CLI commands.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use num_complex::Complex64;
use serde::Deserialize;

use qfuse_compile::FusionConfig;
use qfuse_ir::{Circuit, Gate, GateMatrix, ParameterExpression, QubitId, StandardGate};

use crate::FusionArgs;

/// A circuit file: a register size and gates in program order.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitDocument {
    /// Circuit name; defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// Register size.
    pub num_qubits: u32,
    /// Gates in program order.
    pub gates: Vec<GateDocument>,
}

/// One gate of a circuit file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateDocument {
    /// Standard gate name (`h`, `cx`, `rz`, ...) or `unitary`.
    pub name: String,
    /// Target qubits; controls first.
    pub qubits: Vec<u32>,
    /// Angle parameters.
    #[serde(default)]
    pub params: Vec<ParamDocument>,
    /// Row-major `[re, im]` pairs, only for `unitary`.
    #[serde(default)]
    pub matrix: Option<Vec<[f64; 2]>>,
}

/// An angle: a number, or a symbol name optionally prefixed by `-`.
///
/// `pi` and `-pi` are constants, not symbols.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParamDocument {
    /// Constant angle.
    Value(f64),
    /// Runtime parameter.
    Symbol(String),
}

impl ParamDocument {
    fn to_expression(&self) -> ParameterExpression {
        match self {
            ParamDocument::Value(v) => ParameterExpression::constant(*v),
            ParamDocument::Symbol(s) => {
                let (negate, name) = match s.trim().strip_prefix('-') {
                    Some(rest) => (true, rest.trim()),
                    None => (false, s.trim()),
                };
                let expr = if name.eq_ignore_ascii_case("pi") {
                    ParameterExpression::pi()
                } else {
                    ParameterExpression::symbol(name)
                };
                if negate { -expr } else { expr }
            }
        }
    }
}

impl CircuitDocument {
    /// Build the circuit, adding gates in document order.
    pub fn into_circuit(self, default_name: &str) -> Result<Circuit> {
        let name = self.name.unwrap_or_else(|| default_name.to_string());
        let mut circuit = Circuit::new(name, self.num_qubits)?;
        for (index, gate) in self.gates.into_iter().enumerate() {
            let qubits: Vec<QubitId> = gate.qubits.iter().copied().map(QubitId).collect();
            let built = if gate.name.eq_ignore_ascii_case("unitary") {
                unitary(&gate, qubits)
            } else {
                let params = gate.params.iter().map(ParamDocument::to_expression).collect();
                let standard = StandardGate::from_name(&gate.name, params).with_context(|| {
                    format!(
                        "Unknown gate '{}' with {} parameters",
                        gate.name,
                        gate.params.len()
                    )
                })?;
                Gate::standard(&standard, qubits).map_err(anyhow::Error::from)
            };
            let built = built.with_context(|| format!("Invalid gate #{index} ('{}')", gate.name))?;
            circuit
                .gate(built)
                .with_context(|| format!("Cannot add gate #{index} ('{}')", gate.name))?;
        }
        Ok(circuit)
    }
}

fn unitary(gate: &GateDocument, qubits: Vec<QubitId>) -> Result<Gate> {
    let entries = gate
        .matrix
        .as_ref()
        .context("A 'unitary' gate needs a 'matrix' field")?
        .iter()
        .map(|[re, im]| Complex64::new(*re, *im))
        .collect();
    let matrix = GateMatrix::numeric(qubits.len(), entries)?;
    Ok(Gate::new("unitary", qubits, matrix)?)
}

/// Input formats of circuit and config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from a file extension; anything but `.json` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("json") => Format::Json,
            _ => Format::Yaml,
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(self, source: &str) -> Result<T> {
        match self {
            Format::Json => serde_json::from_str(source).context("Invalid JSON"),
            Format::Yaml => serde_yaml_ng::from_str(source).context("Invalid YAML"),
        }
    }
}

fn read(path: &str) -> Result<String> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))
}

/// Parse a circuit from source text.
pub fn parse_circuit(source: &str, format: Format, default_name: &str) -> Result<Circuit> {
    let document: CircuitDocument = format.parse(source)?;
    document.into_circuit(default_name)
}

/// Load a circuit from a JSON or YAML file.
pub fn load_circuit(path: &str) -> Result<Circuit> {
    let source = read(path)?;
    let path_obj = Path::new(path);
    let stem = path_obj
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "circuit".to_string());
    parse_circuit(&source, Format::from_path(path_obj), &stem)
        .with_context(|| format!("Failed to load circuit: {path}"))
}

/// Resolve the fusion config: file first, then flag overrides, then validation.
pub fn resolve_config(args: &FusionArgs) -> Result<FusionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let source = read(path)?;
            Format::from_path(Path::new(path))
                .parse::<FusionConfig>(&source)
                .with_context(|| format!("Failed to load config: {path}"))?
        }
        None => FusionConfig::default(),
    };
    if let Some(arity) = args.max_fused_arity {
        config = config.with_max_fused_arity(arity);
    }
    if let Some(ceiling) = args.operation_count_ceiling {
        config = config.with_operation_count_ceiling(ceiling);
    }
    if let Some(threshold) = args.zero_skip_threshold {
        config = config.with_zero_skip_threshold(threshold);
    }
    config.validate()?;
    Ok(config)
}

/// Parse `NAME=VALUE` bindings.
pub fn parse_bindings(bindings: &[String]) -> Result<BTreeMap<String, f64>> {
    bindings
        .iter()
        .map(|binding| {
            let (name, value) = binding
                .split_once('=')
                .with_context(|| format!("Expected NAME=VALUE, got '{binding}'"))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid value for parameter '{}'", name.trim()))?;
            Ok((name.trim().to_string(), value))
        })
        .collect()
}
