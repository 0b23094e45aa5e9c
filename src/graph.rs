//! # Filter Graph
//!
//! A small value model of an ffmpeg `-filter_complex` graph. Track builders
//! compose [`Filter`]s into [`FilterChain`]s and append them to a
//! [`FilterGraph`]; rendering to ffmpeg syntax happens once, at the end.

use std::fmt;

/// One filter with ordered `key=value` options (or bare positional values)
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    options: Vec<(Option<String>, String)>,
}

impl Filter {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    /// Add a named option
    pub fn opt<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.options.push((Some(key.into()), value.to_string()));
        self
    }

    /// Add a positional option
    pub fn arg<V: ToString>(mut self, value: V) -> Self {
        self.options.push((None, value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of a named option, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, (key, value)) in self.options.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match key {
                Some(key) => write!(f, "{}={}", key, value)?,
                None => f.write_str(value)?,
            }
        }
        Ok(())
    }
}

/// A linear run of filters from zero or more input pads to one output pad
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filters: Vec<Filter>,
    output: String,
}

impl FilterChain {
    /// Start a chain reading from the given pads (e.g. `0:v`, `v1`)
    pub fn from_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            filters: Vec::new(),
            output: String::new(),
        }
    }

    /// Start a chain from a single pad
    pub fn from_input<S: Into<String>>(input: S) -> Self {
        Self::from_inputs([input])
    }

    /// Start a chain with a source filter and no input pads
    pub fn source(filter: Filter) -> Self {
        Self {
            inputs: Vec::new(),
            filters: vec![filter],
            output: String::new(),
        }
    }

    pub fn then(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append every filter of `filters` in order
    pub fn then_all<I: IntoIterator<Item = Filter>>(mut self, filters: I) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn output<S: Into<String>>(mut self, label: S) -> Self {
        self.output = label.into();
        self
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn output_label(&self) -> &str {
        &self.output
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        if !self.output.is_empty() {
            write!(f, "[{}]", self.output)?;
        }
        Ok(())
    }
}

/// A complete `-filter_complex` graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chain and return its output label
    pub fn push(&mut self, chain: FilterChain) -> String {
        let label = chain.output.clone();
        self.chains.push(chain);
        label
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// The chain producing `label`, if any
    pub fn producer(&self, label: &str) -> Option<&FilterChain> {
        self.chains.iter().find(|chain| chain.output == label)
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Check that every chain has an output and every consumed label is produced
    /// earlier or refers to an input stream (`N:v`, `N:a`)
    pub fn check(&self) -> std::result::Result<(), String> {
        let mut produced: Vec<&str> = Vec::new();
        for (i, chain) in self.chains.iter().enumerate() {
            if chain.output.is_empty() {
                return Err(format!("chain {} has no output label", i));
            }
            if chain.filters.is_empty() {
                return Err(format!("chain {} has no filters", i));
            }
            for input in &chain.inputs {
                let is_stream = input.contains(':');
                if !is_stream && !produced.contains(&input.as_str()) {
                    return Err(format!("chain {} reads undefined label [{}]", i, input));
                }
            }
            if produced.contains(&chain.output.as_str()) {
                return Err(format!("label [{}] is produced twice", chain.output));
            }
            produced.push(&chain.output);
        }
        Ok(())
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}

/// Seconds formatted the way ffmpeg options expect them
pub fn seconds(value: f64) -> String {
    format!("{:.3}", value)
}
