use serde::{Deserialize, Serialize};

/// Color used as the layered window's transparency key. Pixels painted in this
/// color are not shown.
pub const TRANSPARENT_KEY_COLOR: HighlightColor = HighlightColor::rgb(0, 0, 0);
const COLORKEY_SAFE_FALLBACK: HighlightColor = HighlightColor::rgb(1, 1, 1);

/// A tracked screen region category.
///
/// The declaration order doubles as the draw order of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    Focus,
    Navigator,
    /// Rendering-only context used when focus and navigator coincide.
    FocusNavigator,
    BrowseMode,
}

impl Context {
    /// Contexts the host can report locations for.
    pub const TRACKED: [Context; 3] = [Context::Focus, Context::Navigator, Context::BrowseMode];

    pub(crate) fn tracked_index(self) -> Option<usize> {
        match self {
            Self::Focus => Some(0),
            Self::Navigator => Some(1),
            Self::BrowseMode => Some(2),
            Self::FocusNavigator => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HighlightColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HighlightColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn collides_with_transparent_key(self) -> bool {
        self == TRANSPARENT_KEY_COLOR
    }

    pub fn resolve_transparent_key_collision(self) -> Self {
        if self.collides_with_transparent_key() {
            COLORKEY_SAFE_FALLBACK
        } else {
            self
        }
    }

    /// Packs the color as a GDI `COLORREF` value (`0x00BBGGRR`).
    pub fn to_colorref_bits(self) -> u32 {
        (self.r as u32) | ((self.g as u32) << 8) | ((self.b as u32) << 16)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DashStyle {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
}

/// How a single context is outlined.
///
/// `width` eats into the inner area of the outline, so growing the outer
/// dimensions needs a larger `margin` as well. `margin` may be negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HighlightStyle {
    pub color: HighlightColor,
    pub width: u32,
    pub dash: DashStyle,
    pub margin: i32,
}

impl HighlightStyle {
    pub const fn new(color: HighlightColor, width: u32, dash: DashStyle, margin: i32) -> Self {
        Self {
            color,
            width,
            dash,
            margin,
        }
    }
}

pub const BLUE: HighlightColor = HighlightColor::rgb(0x03, 0x36, 0xff);
pub const PINK: HighlightColor = HighlightColor::rgb(0x00, 0xff, 0x66);
pub const YELLOW: HighlightColor = HighlightColor::rgb(0xff, 0xde, 0x03);

pub const DASH_BLUE: HighlightStyle = HighlightStyle::new(BLUE, 2, DashStyle::Dash, 2);
pub const SOLID_PINK: HighlightStyle = HighlightStyle::new(PINK, 2, DashStyle::Solid, 2);
pub const SOLID_BLUE: HighlightStyle = HighlightStyle::new(BLUE, 2, DashStyle::Solid, 2);
pub const SOLID_YELLOW: HighlightStyle = HighlightStyle::new(YELLOW, 2, DashStyle::Solid, 2);

/// One style per context, including the composite one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StyleTable {
    pub focus: HighlightStyle,
    pub navigator: HighlightStyle,
    pub focus_navigator: HighlightStyle,
    pub browse_mode: HighlightStyle,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self {
            focus: DASH_BLUE,
            navigator: SOLID_PINK,
            focus_navigator: SOLID_BLUE,
            browse_mode: SOLID_YELLOW,
        }
    }
}

impl StyleTable {
    pub fn style_for(&self, context: Context) -> HighlightStyle {
        match context {
            Context::Focus => self.focus,
            Context::Navigator => self.navigator,
            Context::FocusNavigator => self.focus_navigator,
            Context::BrowseMode => self.browse_mode,
        }
    }

    /// Returns a copy whose colors are all visible through the color key.
    pub fn sanitized(mut self) -> Self {
        for style in [
            &mut self.focus,
            &mut self.navigator,
            &mut self.focus_navigator,
            &mut self.browse_mode,
        ] {
            style.color = style.color.resolve_transparent_key_collision();
        }
        self
    }
}

/// Contexts that are currently switched on by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnabledContexts {
    pub focus: bool,
    pub navigator: bool,
    pub browse_mode: bool,
}

impl EnabledContexts {
    pub const ALL: Self = Self {
        focus: true,
        navigator: true,
        browse_mode: true,
    };

    pub const NONE: Self = Self {
        focus: false,
        navigator: false,
        browse_mode: false,
    };

    pub fn contains(self, context: Context) -> bool {
        match context {
            Context::Focus => self.focus,
            Context::Navigator => self.navigator,
            Context::FocusNavigator => self.focus && self.navigator,
            Context::BrowseMode => self.browse_mode,
        }
    }

    pub fn is_empty(self) -> bool {
        !(self.focus || self.navigator || self.browse_mode)
    }

    pub fn iter(self) -> impl Iterator<Item = Context> {
        Context::TRACKED
            .into_iter()
            .filter(move |context| self.contains(*context))
    }
}
