// ============================================================================
// NODE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Page,
    View,
    Text,
    Image,
    Table,
    Row,
    Cell,
}

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Row,
    #[default]
    Column,
}

/// Main-axis alignment (justify-content)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MainAlign {
    #[default]
    Start,
    Center,
}

/// Cross-axis alignment (align-items)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossAlign {
    #[default]
    Start,
    Center,
    End,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Dimension value - fixed CSS pixels or a percentage of the parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Px(f32),
    Percent(f32),
}

impl Dimension {
    pub fn resolve(&self, parent_size: f32) -> f32 {
        match self {
            Dimension::Px(v) => *v,
            Dimension::Percent(p) => parent_size * p / 100.0,
        }
    }
}

// ============================================================================
// COLOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// Parse `#rrggbb`; anything else falls back to black.
    pub fn hex(value: &str) -> Self {
        let digits = value.trim_start_matches('#');
        let channel = |i: usize| {
            digits
                .get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .unwrap_or(0)
        };
        if digits.len() != 6 {
            return Color::black();
        }
        Color::rgb(channel(0), channel(2), channel(4))
    }

    pub const fn black() -> Self {
        Color::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Color::rgb(255, 255, 255)
    }
}

// ============================================================================
// STYLE
// ============================================================================

/// Border on one side of a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Default)]
pub struct Style {
    // --- Dimensions ---
    pub width: Option<Dimension>,
    pub height: Option<Dimension>,

    // --- Flex / Layout ---
    pub direction: Option<Direction>,
    pub main_align: Option<MainAlign>,
    pub cross_align: Option<CrossAlign>,
    pub gap: Option<f32>,
    /// flex-grow within a row
    pub flex: Option<f32>,

    // --- Box model ---
    pub padding: Option<f32>,
    pub padding_top: Option<f32>,
    pub padding_bottom: Option<f32>,
    pub margin_top: Option<f32>,
    pub margin_bottom: Option<f32>,

    // --- Paint ---
    pub background_color: Option<Color>,
    pub border: Option<BorderSide>,
    pub border_bottom: Option<BorderSide>,

    // --- Text ---
    pub text_align: Option<TextAlign>,
    pub color: Option<Color>,
    pub font_size: Option<f32>,
    pub font_weight: Option<FontWeight>,
    pub line_height: Option<f32>,
}

impl Style {
    /// Get padding as (top, right, bottom, left)
    pub fn padding_trbl(&self) -> (f32, f32, f32, f32) {
        let base = self.padding.unwrap_or(0.0);
        (
            self.padding_top.unwrap_or(base),
            base,
            self.padding_bottom.unwrap_or(base),
            base,
        )
    }

    /// Get border widths as (top, right, bottom, left)
    pub fn border_widths(&self) -> (f32, f32, f32, f32) {
        let base = self.border.map(|b| b.width).unwrap_or(0.0);
        let bottom = self.border_bottom.map(|b| b.width).unwrap_or(base);
        (base, base, bottom, base)
    }
}

// ============================================================================
// NODE
// ============================================================================

/// One element of a renderable document tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub node_type: NodeType,
    pub style: Style,
    pub children: Vec<Node>,
    /// Text content (Text nodes)
    pub text: Option<String>,
    /// Image source (Image nodes); only `data:` sources are painted
    pub src: Option<String>,
    /// Column widths (Table nodes)
    pub column_widths: Vec<Dimension>,
    /// Stable tag used to locate parts of a rendered document
    pub key: Option<&'static str>,
}

impl Node {
    fn new(node_type: NodeType, style: Style) -> Self {
        Node {
            node_type,
            style,
            children: Vec::new(),
            text: None,
            src: None,
            column_widths: Vec::new(),
            key: None,
        }
    }

    pub fn page(style: Style, children: Vec<Node>) -> Self {
        Node::new(NodeType::Page, style).with_children(children)
    }

    pub fn view(style: Style, children: Vec<Node>) -> Self {
        Node::new(NodeType::View, style).with_children(children)
    }

    pub fn text(text: impl Into<String>, style: Style) -> Self {
        let mut node = Node::new(NodeType::Text, style);
        node.text = Some(text.into());
        node
    }

    pub fn image(src: impl Into<String>, style: Style) -> Self {
        let mut node = Node::new(NodeType::Image, style);
        node.src = Some(src.into());
        node
    }

    pub fn table(column_widths: Vec<Dimension>, style: Style, rows: Vec<Node>) -> Self {
        let mut node = Node::new(NodeType::Table, style).with_children(rows);
        node.column_widths = column_widths;
        node
    }

    pub fn row(style: Style, cells: Vec<Node>) -> Self {
        Node::new(NodeType::Row, style).with_children(cells)
    }

    pub fn cell(style: Style, children: Vec<Node>) -> Self {
        Node::new(NodeType::Cell, style).with_children(children)
    }

    pub fn keyed(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Depth-first search for every node tagged with `key`.
    #[cfg(test)]
    pub fn find_all(&self, key: &str) -> Vec<&Node> {
        let mut found = Vec::new();
        self.collect(key, &mut found);
        found
    }

    #[cfg(test)]
    fn collect<'a>(&'a self, key: &str, found: &mut Vec<&'a Node>) {
        if self.key == Some(key) {
            found.push(self);
        }
        for child in &self.children {
            child.collect(key, found);
        }
    }

    /// Concatenated text of this node and its descendants.
    #[cfg(test)]
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    #[cfg(test)]
    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        if let Some(text) = &self.text {
            parts.push(text);
        }
        for child in &self.children {
            child.collect_text(parts);
        }
    }
}

/// A write-once document tree laid out at a fixed nominal width.
#[derive(Debug, Clone)]
pub struct RenderableDocument {
    pub root: Node,
    /// Nominal width in CSS pixels
    pub width: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse() {
        assert_eq!(Color::hex("#1e40af"), Color::rgb(0x1e, 0x40, 0xaf));
        assert_eq!(Color::hex("bogus"), Color::black());
    }

    #[test]
    fn percent_dimension_resolves_against_parent() {
        assert_eq!(Dimension::Percent(25.0).resolve(200.0), 50.0);
        assert_eq!(Dimension::Px(12.0).resolve(200.0), 12.0);
    }

    #[test]
    fn find_all_walks_the_tree() {
        let root = Node::view(
            Style::default(),
            vec![
                Node::text("a", Style::default()).keyed("line"),
                Node::view(Style::default(), vec![Node::text("b", Style::default()).keyed("line")]),
            ],
        );
        let lines = root.find_all("line");
        assert_eq!(lines.len(), 2);
        assert_eq!(root.plain_text(), "a b");
    }
}
