use crate::fonts::TextMeasure;
use crate::layout::{
    CrossAlign, Direction, FontWeight, MainAlign, Node, NodeType, RenderableDocument, TextAlign,
};

pub const DEFAULT_FONT_SIZE: f32 = 12.0;
pub const DEFAULT_LINE_HEIGHT: f32 = 1.35;
const DEFAULT_IMAGE_SIZE: f32 = 100.0;

// ============================================================================
// LAYOUT BOX
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TableLayout {
    pub column_widths: Vec<f32>,
    pub row_heights: Vec<f32>,
}

/// A node with its computed geometry. Coordinates are CSS pixels, origin
/// top-left, y growing downward.
#[derive(Debug, Clone)]
pub struct LayoutBox<'a> {
    pub x: f32,
    pub y: f32,

    // Size includes padding and border, excludes margin
    pub width: f32,
    pub height: f32,

    pub margin_top: f32,
    pub margin_bottom: f32,

    pub children: Vec<LayoutBox<'a>>,
    pub node: &'a Node,

    // For Text nodes: pre-wrapped lines
    pub lines: Vec<String>,

    // For Table nodes: computed grid info
    pub table: Option<TableLayout>,
}

impl<'a> LayoutBox<'a> {
    pub fn new(node: &'a Node) -> Self {
        LayoutBox {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            margin_top: node.style.margin_top.unwrap_or(0.0),
            margin_bottom: node.style.margin_bottom.unwrap_or(0.0),
            children: Vec::new(),
            node,
            lines: Vec::new(),
            table: None,
        }
    }

    pub fn resolve_width(&self, parent_width: f32) -> Option<f32> {
        self.node.style.width.map(|d| d.resolve(parent_width))
    }

    pub fn flex(&self) -> f32 {
        self.node.style.flex.unwrap_or(0.0)
    }

    pub fn font_size(&self) -> f32 {
        self.node.style.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }

    pub fn is_bold(&self) -> bool {
        self.node.style.font_weight == Some(FontWeight::Bold)
    }

    pub fn text_align(&self) -> TextAlign {
        self.node.style.text_align.unwrap_or_default()
    }

    pub fn line_height(&self) -> f32 {
        self.font_size() * self.node.style.line_height.unwrap_or(DEFAULT_LINE_HEIGHT)
    }

    pub fn outer_height(&self) -> f32 {
        self.margin_top + self.height + self.margin_bottom
    }

    /// Padding plus border as (top, right, bottom, left)
    fn insets(&self) -> (f32, f32, f32, f32) {
        let (pt, pr, pb, pl) = self.node.style.padding_trbl();
        let (bt, br, bb, bl) = self.node.style.border_widths();
        (pt + bt, pr + br, pb + bb, pl + bl)
    }
}

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Build, measure and place a whole document. The root box starts at (0, 0)
/// and its height is the natural, unclipped height of the content.
pub fn layout_document<'a>(
    document: &'a RenderableDocument,
    measure: &dyn TextMeasure,
) -> LayoutBox<'a> {
    let mut root = build_layout(&document.root);
    measure_layout(&mut root, document.width, measure);
    root.width = document.width;
    place_layout(&mut root, 0.0, 0.0);
    root
}

pub fn build_layout(node: &Node) -> LayoutBox<'_> {
    let mut lb = LayoutBox::new(node);
    for child in &node.children {
        lb.children.push(build_layout(child));
    }
    lb
}

// ============================================================================
// MEASURE PASS
// ============================================================================

pub fn measure_layout(layout: &mut LayoutBox, parent_width: f32, measure: &dyn TextMeasure) {
    match layout.node.node_type {
        NodeType::Text => measure_text(layout, parent_width, measure),
        NodeType::Image => measure_image(layout, parent_width),
        NodeType::Table => measure_table(layout, parent_width, measure),
        NodeType::Page | NodeType::View | NodeType::Row | NodeType::Cell => {
            measure_container(layout, parent_width, measure)
        }
    }
}

fn measure_text(layout: &mut LayoutBox, parent_width: f32, measure: &dyn TextMeasure) {
    let text = layout.node.text.clone().unwrap_or_default();
    let size = layout.font_size();
    let bold = layout.is_bold();
    let max_width = layout.resolve_width(parent_width).unwrap_or(parent_width);

    layout.lines = wrap_text(&text, size, bold, max_width, measure);
    let widest = layout
        .lines
        .iter()
        .map(|line| measure.text_width(line, size, bold))
        .fold(0.0f32, f32::max);

    layout.width = layout.resolve_width(parent_width).unwrap_or(widest);
    layout.height = layout.line_height() * layout.lines.len() as f32;
}

/// Greedy word wrap. Words wider than the line are broken between characters.
fn wrap_text(
    text: &str,
    size: f32,
    bold: bool,
    max_width: f32,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let fits = |s: &str| measure.text_width(s, size, bold) <= max_width;
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let tentative = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if fits(&tentative) {
            current = tentative;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if fits(word) {
            current = word.to_string();
            continue;
        }

        for c in word.chars() {
            current.push(c);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

fn measure_image(layout: &mut LayoutBox, parent_width: f32) {
    layout.width = layout.resolve_width(parent_width).unwrap_or(DEFAULT_IMAGE_SIZE);
    layout.height = layout
        .node
        .style
        .height
        .map(|d| d.resolve(0.0))
        .unwrap_or(DEFAULT_IMAGE_SIZE);
}

fn measure_container(layout: &mut LayoutBox, parent_width: f32, measure: &dyn TextMeasure) {
    let dir = layout.node.style.direction.unwrap_or_default();
    let gap = layout.node.style.gap.unwrap_or(0.0);
    let (in_t, in_r, in_b, in_l) = layout.insets();

    let explicit_width = layout.resolve_width(parent_width);
    let inner_available = (explicit_width.unwrap_or(parent_width) - in_l - in_r).max(0.0);

    let (content_w, content_h) = match dir {
        Direction::Column => {
            for child in &mut layout.children {
                measure_layout(child, inner_available, measure);
            }
            measure_column(&layout.children, gap)
        }
        Direction::Row => measure_row(&mut layout.children, inner_available, gap, measure),
    };

    layout.width = explicit_width.unwrap_or(content_w + in_l + in_r);
    layout.height = layout
        .node
        .style
        .height
        .map(|d| d.resolve(0.0))
        .unwrap_or(content_h + in_t + in_b);
}

fn measure_column(children: &[LayoutBox], gap: f32) -> (f32, f32) {
    let width = children.iter().map(|c| c.width).fold(0.0f32, f32::max);
    let height = children.iter().map(LayoutBox::outer_height).sum::<f32>()
        + gap * children.len().saturating_sub(1) as f32;
    (width, height)
}

/// Fixed children are measured first; flex children share what is left.
fn measure_row(
    children: &mut [LayoutBox],
    inner_available: f32,
    gap: f32,
    measure: &dyn TextMeasure,
) -> (f32, f32) {
    let total_gap = gap * children.len().saturating_sub(1) as f32;
    let total_flex: f32 = children.iter().map(LayoutBox::flex).sum();

    let mut fixed_width = 0.0;
    for child in children.iter_mut().filter(|c| c.flex() <= 0.0) {
        measure_layout(child, inner_available, measure);
        fixed_width += child.width;
    }

    let remaining = (inner_available - fixed_width - total_gap).max(0.0);
    for child in children.iter_mut().filter(|c| c.flex() > 0.0) {
        let share = remaining * child.flex() / total_flex;
        measure_layout(child, share, measure);
        child.width = share;
    }

    let width = children.iter().map(|c| c.width).sum::<f32>() + total_gap;
    let height = children
        .iter()
        .map(LayoutBox::outer_height)
        .fold(0.0f32, f32::max);
    (width, height)
}

fn measure_table(layout: &mut LayoutBox, parent_width: f32, measure: &dyn TextMeasure) {
    let (in_t, in_r, in_b, in_l) = layout.insets();
    let explicit_width = layout.resolve_width(parent_width);
    let inner_width = (explicit_width.unwrap_or(parent_width) - in_l - in_r).max(0.0);

    let num_cols = layout
        .children
        .iter()
        .map(|row| row.children.len())
        .max()
        .unwrap_or(0);

    if num_cols == 0 {
        layout.width = explicit_width.unwrap_or(0.0);
        layout.height = in_t + in_b;
        layout.table = Some(TableLayout::default());
        return;
    }

    let mut col_widths = vec![0.0f32; num_cols];
    for (i, dim) in layout.node.column_widths.iter().enumerate().take(num_cols) {
        col_widths[i] = dim.resolve(inner_width);
    }
    let specified: f32 = col_widths.iter().sum();
    let unspecified = col_widths.iter().filter(|w| **w == 0.0).count();
    if unspecified > 0 {
        let default_w = (inner_width - specified).max(0.0) / unspecified as f32;
        for w in col_widths.iter_mut().filter(|w| **w == 0.0) {
            *w = default_w;
        }
    }

    let mut row_heights = Vec::with_capacity(layout.children.len());
    for row in layout.children.iter_mut() {
        let mut row_height: f32 = 0.0;
        for (cell, &col_width) in row.children.iter_mut().zip(&col_widths) {
            measure_layout(cell, col_width, measure);
            cell.width = col_width;
            row_height = row_height.max(cell.outer_height());
        }
        row.height = row_height;
        row_heights.push(row_height);
    }

    layout.width = explicit_width.unwrap_or(inner_width + in_l + in_r);
    layout.height = row_heights.iter().sum::<f32>() + in_t + in_b;
    layout.table = Some(TableLayout {
        column_widths: col_widths,
        row_heights,
    });
}

// ============================================================================
// PLACE PASS
// ============================================================================

/// Place a box whose margin box starts at (x, y).
pub fn place_layout(layout: &mut LayoutBox, x: f32, y: f32) {
    layout.x = x;
    layout.y = y + layout.margin_top;

    match layout.node.node_type {
        NodeType::Page | NodeType::View | NodeType::Row | NodeType::Cell => {
            place_container(layout)
        }
        NodeType::Table => place_table(layout),
        NodeType::Text | NodeType::Image => {}
    }
}

fn place_container(layout: &mut LayoutBox) {
    let dir = layout.node.style.direction.unwrap_or_default();
    let gap = layout.node.style.gap.unwrap_or(0.0);
    let main_align = layout.node.style.main_align.unwrap_or_default();
    let cross_align = layout.node.style.cross_align.unwrap_or(CrossAlign::Stretch);
    let (in_t, in_r, in_b, in_l) = layout.insets();

    let inner_x = layout.x + in_l;
    let inner_y = layout.y + in_t;
    let inner_w = (layout.width - in_l - in_r).max(0.0);
    let inner_h = (layout.height - in_t - in_b).max(0.0);
    let n = layout.children.len();
    if n == 0 {
        return;
    }

    match dir {
        Direction::Column => {
            let total_h: f32 = layout.children.iter().map(LayoutBox::outer_height).sum::<f32>()
                + gap * (n - 1) as f32;
            let mut cursor_y = inner_y + main_axis_offset(main_align, inner_h - total_h);

            for child in layout.children.iter_mut() {
                let child_x = match cross_align {
                    CrossAlign::Start => inner_x,
                    CrossAlign::Center => inner_x + (inner_w - child.width) / 2.0,
                    CrossAlign::End => inner_x + inner_w - child.width,
                    CrossAlign::Stretch => {
                        child.width = inner_w;
                        inner_x
                    }
                };
                place_layout(child, child_x, cursor_y);
                cursor_y += child.outer_height() + gap;
            }
        }
        Direction::Row => {
            let total_w: f32 =
                layout.children.iter().map(|c| c.width).sum::<f32>() + gap * (n - 1) as f32;
            let mut cursor_x = inner_x + main_axis_offset(main_align, inner_w - total_w);

            for child in layout.children.iter_mut() {
                let child_y = match cross_align {
                    CrossAlign::Start => inner_y,
                    CrossAlign::Center => inner_y + (inner_h - child.outer_height()) / 2.0,
                    CrossAlign::End => inner_y + inner_h - child.outer_height(),
                    CrossAlign::Stretch => {
                        child.height = inner_h - child.margin_top - child.margin_bottom;
                        inner_y
                    }
                };
                place_layout(child, cursor_x, child_y);
                cursor_x += child.width + gap;
            }
        }
    }
}

/// Starting offset along the main axis.
fn main_axis_offset(align: MainAlign, free: f32) -> f32 {
    match align {
        MainAlign::Start => 0.0,
        MainAlign::Center => free.max(0.0) / 2.0,
    }
}

fn place_table(layout: &mut LayoutBox) {
    let Some(table) = layout.table.clone() else {
        return;
    };
    let (in_t, _, _, in_l) = layout.insets();
    let start_x = layout.x + in_l;
    let inner_width: f32 = table.column_widths.iter().sum();
    let mut cursor_y = layout.y + in_t;

    for (row, &row_height) in layout.children.iter_mut().zip(&table.row_heights) {
        row.x = start_x;
        row.y = cursor_y;
        row.width = inner_width;
        row.height = row_height;

        let mut cursor_x = start_x;
        for (cell, &col_width) in row.children.iter_mut().zip(&table.column_widths) {
            cell.width = col_width;
            cell.height = row_height - cell.margin_top - cell.margin_bottom;
            place_layout(cell, cursor_x, cursor_y);
            cursor_x += col_width;
        }

        cursor_y += row_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontBook;
    use crate::layout::{Dimension, Style};

    fn text(s: &str, size: f32) -> Node {
        Node::text(
            s,
            Style {
                font_size: Some(size),
                line_height: Some(1.0),
                ..Default::default()
            },
        )
    }

    #[test]
    fn long_text_wraps_within_parent_width() {
        let fonts = FontBook::empty();
        // 0.55em advance at 10px: "AAAA" is 22px, "AAAA BBBB" 49.5px
        let lines = wrap_text("AAAA BBBB CCCC", 10.0, false, 50.0, &fonts);
        assert_eq!(lines, vec!["AAAA BBBB", "CCCC"]);

        let lines = wrap_text("AAAA BBBB CCCC", 10.0, false, 40.0, &fonts);
        assert_eq!(lines, vec!["AAAA", "BBBB", "CCCC"]);
    }

    #[test]
    fn wrapping_follows_real_glyph_advances() {
        // Both strings are nine characters, so the estimate treats them alike.
        let estimate = FontBook::empty();
        assert_eq!(wrap_text("WWWW WWWW", 10.0, false, 50.0, &estimate).len(), 1);
        assert_eq!(wrap_text("iiii iiii", 10.0, false, 50.0, &estimate).len(), 1);

        let fonts = FontBook::bundled();
        assert_eq!(
            wrap_text("WWWW WWWW", 10.0, false, 50.0, &fonts),
            vec!["WWWW", "WWWW"]
        );
        assert_eq!(
            wrap_text("iiii iiii", 10.0, false, 50.0, &fonts),
            vec!["iiii iiii"]
        );
    }

    #[test]
    fn unbreakable_words_split_between_characters() {
        let fonts = FontBook::empty();
        let lines = wrap_text("ABCDEFGHIJ", 10.0, false, 30.0, &fonts);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "ABCDEFGHIJ");
    }

    #[test]
    fn empty_text_keeps_one_line() {
        let fonts = FontBook::empty();
        assert_eq!(wrap_text("", 10.0, false, 30.0, &fonts), vec![String::new()]);
    }

    #[test]
    fn column_stacks_children_with_padding_and_gap() {
        let doc = RenderableDocument {
            root: Node::page(
                Style {
                    padding: Some(10.0),
                    gap: Some(5.0),
                    ..Default::default()
                },
                vec![text("one", 10.0), text("two", 10.0)],
            ),
            width: 200.0,
        };
        let fonts = FontBook::empty();
        let root = layout_document(&doc, &fonts);

        assert_eq!(root.width, 200.0);
        assert_eq!(root.height, 10.0 + 10.0 + 5.0 + 10.0 + 10.0);
        assert_eq!(root.children[0].y, 10.0);
        assert_eq!(root.children[1].y, 25.0);
        assert_eq!(root.children[1].width, 180.0);
    }

    #[test]
    fn row_gives_flex_children_the_remaining_width() {
        let doc = RenderableDocument {
            root: Node::view(
                Style {
                    direction: Some(Direction::Row),
                    ..Default::default()
                },
                vec![
                    Node::image(
                        "data:,",
                        Style {
                            width: Some(Dimension::Px(40.0)),
                            height: Some(Dimension::Px(40.0)),
                            ..Default::default()
                        },
                    ),
                    Node::view(
                        Style {
                            flex: Some(1.0),
                            ..Default::default()
                        },
                        vec![text("title", 10.0)],
                    ),
                ],
            ),
            width: 300.0,
        };
        let fonts = FontBook::empty();
        let root = layout_document(&doc, &fonts);

        assert_eq!(root.children[1].width, 260.0);
        assert_eq!(root.children[1].x, 40.0);
        assert_eq!(root.height, 40.0);
    }

    #[test]
    fn table_rows_take_the_tallest_cell() {
        let cell = |s: &str| Node::cell(Style::default(), vec![text(s, 10.0)]);
        let doc = RenderableDocument {
            root: Node::table(
                vec![Dimension::Percent(50.0)],
                Style::default(),
                vec![
                    Node::row(Style::default(), vec![cell("a"), cell("b c d e f g h i j k")]),
                    Node::row(Style::default(), vec![cell("x"), cell("y")]),
                ],
            ),
            width: 100.0,
        };
        let fonts = FontBook::empty();
        let root = layout_document(&doc, &fonts);
        let table = root.table.as_ref().unwrap();

        assert_eq!(table.column_widths, vec![50.0, 50.0]);
        assert!(table.row_heights[0] > table.row_heights[1]);
        assert_eq!(root.children[1].y, table.row_heights[0]);
        assert_eq!(root.children[0].children[1].x, 50.0);
    }
}
