/// Per-uniform texture sampling options.
///
/// The front-end sends options as raw strings (`"nearest"`, `"mirrored repeat"`...).
/// Parsing is strict: unrecognized values yield `None` and the caller
/// reports a configuration diagnostic before falling back to the default.

/// Texture minification/magnification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    /// Closest texel
    Nearest,
    /// Bilinear blend of the 4 closest texels
    #[default]
    Linear,
}

impl Interpolation {
    /// Parse `"nearest"` or `"linear"`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "nearest" => Some(Interpolation::Nearest),
            "linear" => Some(Interpolation::Linear),
            _ => None,
        }
    }
}

/// Texture coordinate wrapping mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Coordinates outside [0, 1] read the edge texel
    #[default]
    ClampToEdge,
    /// Coordinates wrap around
    Repeat,
    /// Coordinates wrap around, mirroring every other period
    MirroredRepeat,
}

impl WrapMode {
    /// Parse `"clamp to edge"`, `"repeat"` or `"mirrored repeat"`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "clamp to edge" => Some(WrapMode::ClampToEdge),
            "repeat" => Some(WrapMode::Repeat),
            "mirrored repeat" => Some(WrapMode::MirroredRepeat),
            _ => None,
        }
    }
}

/// Parsed sampling options for one sampler uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureOptions {
    pub interpolation: Interpolation,
    /// Wrap mode for the S (horizontal) and T (vertical) axis
    pub wrap: [WrapMode; 2],
}

/// Unparsed sampling options as declared by the front-end
///
/// `wrap` holds either one value (both axes) or two values (S then T).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureOptionsDesc {
    pub interpolation: Option<String>,
    pub wrap: Option<Vec<String>>,
}

impl TextureOptionsDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interpolation(mut self, interpolation: &str) -> Self {
        self.interpolation = Some(interpolation.to_string());
        self
    }

    pub fn with_wrap(mut self, wrap: &str) -> Self {
        self.wrap = Some(vec![wrap.to_string()]);
        self
    }

    pub fn with_wrap_axes(mut self, s: &str, t: &str) -> Self {
        self.wrap = Some(vec![s.to_string(), t.to_string()]);
        self
    }

    /// Parse into `TextureOptions`
    ///
    /// Invalid entries fall back to their default and are described in the
    /// returned problem list.
    pub fn parse(&self) -> (TextureOptions, Vec<String>) {
        let mut options = TextureOptions::default();
        let mut problems = Vec::new();

        if let Some(value) = &self.interpolation {
            match Interpolation::parse(value) {
                Some(interpolation) => options.interpolation = interpolation,
                None => problems.push(format!("invalid interpolation '{}'", value)),
            }
        }

        if let Some(values) = &self.wrap {
            match values.as_slice() {
                [both] => match WrapMode::parse(both) {
                    Some(mode) => options.wrap = [mode, mode],
                    None => problems.push(format!("invalid wrap '{}'", both)),
                },
                [s, t] => {
                    for (axis, value) in [s, t].into_iter().enumerate() {
                        match WrapMode::parse(value) {
                            Some(mode) => options.wrap[axis] = mode,
                            None => problems.push(format!("invalid wrap '{}'", value)),
                        }
                    }
                }
                _ => problems.push(format!(
                    "wrap expects 1 or 2 values, got {}", values.len()
                )),
            }
        }

        (options, problems)
    }
}

#[cfg(test)]
#[path = "texture_options_tests.rs"]
mod tests;
