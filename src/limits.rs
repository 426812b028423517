// Interpreter safety limits module
//
// Provides configurable resource limits to prevent:
// - Unbounded recursion from deeply nested expressions, blocks or calls
// - Memory exhaustion from very large source files or runaway heaps
// - Programs that never terminate
//
// All limits have sensible defaults and can be overridden via project.toml

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Interpreter safety limits with permissive defaults
#[derive(Debug, Clone)]
pub struct Limits {
    // Lexer limits
    pub max_input_size: usize,        // Maximum source file size in bytes
    pub max_token_count: usize,       // Maximum number of tokens per file
    pub max_identifier_length: usize, // Maximum identifier length in bytes
    pub max_string_length: usize,     // Maximum string literal length in bytes
    pub max_comment_length: usize,    // Maximum comment length in bytes

    // Parser limits
    pub max_expr_depth: usize,  // Maximum expression recursion depth
    pub max_block_depth: usize, // Maximum nesting of if/while/for bodies

    // Runtime limits
    pub max_call_depth: usize, // Maximum nested user function calls
    pub max_steps: u64,        // Maximum executed statements, 0 = unlimited
    pub max_heap_cells: usize, // Maximum live heap cells
}

// Default limits (permissive for developer productivity)
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_size: 10_000_000,    // 10 MB
            max_token_count: 1_000_000,    // 1M tokens
            max_identifier_length: 1_000,  // 1k bytes
            max_string_length: 1_000_000,  // 1 MB
            max_comment_length: 100_000,   // 100k bytes
            max_expr_depth: 256,
            max_block_depth: 128,
            max_call_depth: 512,
            max_steps: 0,
            max_heap_cells: 10_000_000,
        }
    }
}

impl Limits {
    /// Create with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Load limits from project.toml, falling back to defaults
    ///
    /// Returns error only if TOML is malformed, not if file is missing
    pub fn from_project_toml<P: AsRef<Path>>(path: P) -> Result<Self, LimitError> {
        let path = path.as_ref();

        // If file doesn't exist, use defaults
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| LimitError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        Self::from_toml_str(&content).map_err(|e| LimitError {
            message: format!("Failed to parse {}: {}", path.display(), e.message),
        })
    }

    /// Parse a `[limits]` table, overriding only the values it names
    pub fn from_toml_str(content: &str) -> Result<Self, LimitError> {
        let config: ProjectConfig = toml::from_str(content).map_err(|e| LimitError {
            message: e.to_string(),
        })?;

        let mut limits = Self::default();

        if let Some(c) = config.limits {
            if let Some(v) = c.max_input_size {
                limits.max_input_size = v;
            }
            if let Some(v) = c.max_token_count {
                limits.max_token_count = v;
            }
            if let Some(v) = c.max_identifier_length {
                limits.max_identifier_length = v;
            }
            if let Some(v) = c.max_string_length {
                limits.max_string_length = v;
            }
            if let Some(v) = c.max_comment_length {
                limits.max_comment_length = v;
            }
            if let Some(v) = c.max_expr_depth {
                limits.max_expr_depth = v;
            }
            if let Some(v) = c.max_block_depth {
                limits.max_block_depth = v;
            }
            if let Some(v) = c.max_call_depth {
                limits.max_call_depth = v;
            }
            if let Some(v) = c.max_steps {
                limits.max_steps = v;
            }
            if let Some(v) = c.max_heap_cells {
                limits.max_heap_cells = v;
            }
        }

        Ok(limits)
    }

    /// Validate that all limits are reasonable (positive, not absurdly large)
    pub fn validate(&self) -> Result<(), LimitError> {
        const MAX_REASONABLE: usize = 100_000_000; // 100 MB

        if self.max_input_size == 0 || self.max_input_size > MAX_REASONABLE {
            return Err(LimitError::invalid("max_input_size", self.max_input_size));
        }

        if self.max_token_count == 0 {
            return Err(LimitError::invalid("max_token_count", self.max_token_count));
        }

        if self.max_identifier_length == 0 || self.max_identifier_length > 100_000 {
            return Err(LimitError::invalid(
                "max_identifier_length",
                self.max_identifier_length,
            ));
        }

        if self.max_string_length == 0 || self.max_string_length > MAX_REASONABLE {
            return Err(LimitError::invalid(
                "max_string_length",
                self.max_string_length,
            ));
        }

        if self.max_comment_length == 0 || self.max_comment_length > MAX_REASONABLE {
            return Err(LimitError::invalid(
                "max_comment_length",
                self.max_comment_length,
            ));
        }

        if self.max_expr_depth == 0 || self.max_expr_depth > 10_000 {
            return Err(LimitError::invalid("max_expr_depth", self.max_expr_depth));
        }

        if self.max_block_depth == 0 || self.max_block_depth > 10_000 {
            return Err(LimitError::invalid("max_block_depth", self.max_block_depth));
        }

        if self.max_call_depth == 0 || self.max_call_depth > 4_096 {
            return Err(LimitError::invalid("max_call_depth", self.max_call_depth));
        }

        if self.max_heap_cells == 0 {
            return Err(LimitError::invalid("max_heap_cells", self.max_heap_cells));
        }

        Ok(())
    }
}

/// TOML configuration structures for deserialization
#[derive(Debug, Deserialize)]
struct ProjectConfig {
    limits: Option<LimitsConfig>,
}

#[derive(Debug, Deserialize)]
struct LimitsConfig {
    max_input_size: Option<usize>,
    max_token_count: Option<usize>,
    max_identifier_length: Option<usize>,
    max_string_length: Option<usize>,
    max_comment_length: Option<usize>,
    max_expr_depth: Option<usize>,
    max_block_depth: Option<usize>,
    max_call_depth: Option<usize>,
    max_steps: Option<u64>,
    max_heap_cells: Option<usize>,
}

/// Error type for limit validation and loading
#[derive(Debug, Clone)]
pub struct LimitError {
    pub message: String,
}

impl LimitError {
    fn invalid(name: &str, value: usize) -> Self {
        Self {
            message: format!(
                "Invalid limit '{}': {} (must be positive and reasonable)",
                name, value
            ),
        }
    }
}

impl std::fmt::Display for LimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Limit error: {}", self.message)
    }
}

impl std::error::Error for LimitError {}
