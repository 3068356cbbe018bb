//! Colors and node-scoped style components.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display};
use std::str::FromStr;

use figures::units::Px;

/// The name of the component controlling a widget's text color.
pub const TEXT_COLOR: &str = "text_color";

/// The name of the component controlling a widget's background fill.
pub const WIDGET_BACKGROUND: &str = "widget_background";

/// The name of the component controlling the padding applied inside a widget.
pub const INTRINSIC_PADDING: &str = "intrinsic_padding";

/// The default value for [`INTRINSIC_PADDING`].
pub const DEFAULT_PADDING: Px = Px::new(6);

/// A 32-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// The red channel.
    pub red: u8,
    /// The green channel.
    pub green: u8,
    /// The blue channel.
    pub blue: u8,
    /// The alpha channel. 0 is fully transparent.
    pub alpha: u8,
}

impl Color {
    /// A fully transparent color.
    pub const CLEAR: Self = Self::new(0, 0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    /// Returns a color from its channels.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Parses a CSS-style color: a named color (via [`palette::named`]) or a
    /// `#rgb`/`#rrggbb`/`#rrggbbaa` hex string.
    pub fn parse(source: &str) -> Result<Self, InvalidColor> {
        let source = source.trim();
        if let Some(hex) = source.strip_prefix('#') {
            return Self::parse_hex(hex).ok_or(InvalidColor);
        }

        palette::named::from_str(&source.to_ascii_lowercase())
            .map(Self::from)
            .ok_or(InvalidColor)
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        fn nibble(byte: u8) -> Option<u8> {
            char::from(byte)
                .to_digit(16)
                .and_then(|digit| u8::try_from(digit).ok())
        }

        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => {
                let r = nibble(bytes[0])?;
                let g = nibble(bytes[1])?;
                let b = nibble(bytes[2])?;
                Some(Self::new(r << 4 | r, g << 4 | g, b << 4 | b, 255))
            }
            6 | 8 => {
                let mut channels = [255_u8; 4];
                for (index, pair) in bytes.chunks_exact(2).enumerate() {
                    channels[index] = nibble(pair[0])? << 4 | nibble(pair[1])?;
                }
                Some(Self::new(channels[0], channels[1], channels[2], channels[3]))
            }
            _ => None,
        }
    }
}

impl From<palette::Srgb<u8>> for Color {
    fn from(color: palette::Srgb<u8>) -> Self {
        Self::new(color.red, color.green, color.blue, 255)
    }
}

impl FromStr for Color {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The error produced when a string is not a recognized color.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct InvalidColor;

impl Display for InvalidColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unrecognized color")
    }
}

impl Error for InvalidColor {}

/// A single style component value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component {
    /// A color.
    Color(Color),
    /// A dimension in pixels.
    Dimension(Px),
}

impl Component {
    /// Returns the contained color, if this component is a color.
    #[must_use]
    pub fn color(self) -> Option<Color> {
        match self {
            Component::Color(color) => Some(color),
            Component::Dimension(_) => None,
        }
    }

    /// Returns the contained dimension, if this component is a dimension.
    #[must_use]
    pub fn dimension(self) -> Option<Px> {
        match self {
            Component::Dimension(dimension) => Some(dimension),
            Component::Color(_) => None,
        }
    }
}

/// A set of style components scoped to a mounted widget.
///
/// Styles attached to a widget are visible to the widget itself and its
/// descendants, standing in for the stylesheet a non-headless toolkit would
/// load into the widget's rendering scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Styles {
    components: HashMap<&'static str, Component>,
}

impl Styles {
    /// Returns an empty set of styles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `component` under `name`, replacing any existing value.
    pub fn insert(&mut self, name: &'static str, component: Component) {
        self.components.insert(name, component);
    }

    /// Inserts `component` under `name` and returns self.
    #[must_use]
    pub fn with(mut self, name: &'static str, component: Component) -> Self {
        self.insert(name, component);
        self
    }

    /// Returns the component stored under `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Component> {
        self.components.get(name).copied()
    }

    /// Merges all of `other`'s components into self, overwriting existing
    /// entries.
    pub fn append(&mut self, other: Styles) {
        self.components.extend(other.components);
    }

    /// Returns true if no components are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_colors() {
        assert_eq!(Color::parse("red"), Ok(Color::new(255, 0, 0, 255)));
        assert_eq!(Color::parse("RebeccaPurple"), Ok(Color::new(102, 51, 153, 255)));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(Color::parse("#ff0000"), Ok(Color::new(255, 0, 0, 255)));
        assert_eq!(Color::parse("#f00"), Ok(Color::new(255, 0, 0, 255)));
        assert_eq!(Color::parse("#11223344"), Ok(Color::new(0x11, 0x22, 0x33, 0x44)));
    }

    #[test]
    fn invalid_colors() {
        assert_eq!(Color::parse("not-a-color"), Err(InvalidColor));
        assert_eq!(Color::parse("#12345"), Err(InvalidColor));
    }

    #[test]
    fn style_lookup() {
        let styles = Styles::new().with(TEXT_COLOR, Component::Color(Color::BLACK));
        assert_eq!(
            styles.get(TEXT_COLOR).and_then(Component::color),
            Some(Color::BLACK)
        );
        assert_eq!(styles.get(WIDGET_BACKGROUND), None);
    }
}
