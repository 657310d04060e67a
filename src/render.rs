use chrono::{DateTime, Datelike, Utc};

use crate::assets::Asset;
use crate::layout::{
    BorderSide, Color, CrossAlign, Dimension, Direction, FontWeight, MainAlign, Node,
    RenderableDocument, Style, TextAlign,
};
use crate::registration::{ClaimRouting, ContactEntry, ContactRole, RegistrationRecord};

/// A4 at 96 dpi
pub const NOMINAL_WIDTH_PX: f32 = 794.0;
const PAGE_PADDING: f32 = 40.0;
const PLACEHOLDER: &str = "-";

const BRAND: &str = "#0066cc";
const HEADING: &str = "#333333";
const LABEL: &str = "#555555";
const MUTED: &str = "#666666";
const RULE: &str = "#dddddd";
const FAINT_RULE: &str = "#eeeeee";
const PANEL: &str = "#f9f9f9";
const AGREED: &str = "#22c55e";
const DECLINED: &str = "#ef4444";

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

// ============================================================================
// PUBLIC API
// ============================================================================

/// Build the registration summary document. `record` is expected to be
/// normalized already; `logo` decides between the image and the label block.
pub fn render_registration(
    record: &RegistrationRecord,
    logo: &Asset,
    now: DateTime<Utc>,
) -> RenderableDocument {
    let mut sections = vec![header(record, logo, now), company_section(record)];
    if let Some(url) = &record.photo_url {
        sections.push(photo_section(url));
    }
    sections.push(legal_section(record));
    sections.push(contact_section(record));
    sections.push(claim_section(&record.claim_routing));
    sections.push(agreement_section(record.agreement));
    sections.push(footer(now));

    let root = Node::page(
        Style {
            width: Some(Dimension::Px(NOMINAL_WIDTH_PX)),
            padding: Some(PAGE_PADDING),
            background_color: Some(Color::white()),
            ..Default::default()
        },
        sections,
    );

    RenderableDocument {
        root,
        width: NOMINAL_WIDTH_PX,
    }
}

/// Indonesian long date, e.g. `19 Oktober 2026`.
pub fn format_date_id(date: DateTime<Utc>) -> String {
    let month = MONTHS_ID[date.month0() as usize];
    format!("{} {} {}", date.day(), month, date.year())
}

// ============================================================================
// SECTIONS
// ============================================================================

fn header(record: &RegistrationRecord, logo: &Asset, now: DateTime<Utc>) -> Node {
    let logo_node = match logo.data_url() {
        Some(src) => Node::image(
            src,
            Style {
                width: Some(Dimension::Px(40.0)),
                height: Some(Dimension::Px(40.0)),
                ..Default::default()
            },
        )
        .keyed("logo"),
        None => Node::view(
            Style {
                width: Some(Dimension::Px(40.0)),
                height: Some(Dimension::Px(40.0)),
                main_align: Some(MainAlign::Center),
                cross_align: Some(CrossAlign::Center),
                background_color: Some(Color::hex(BRAND)),
                ..Default::default()
            },
            vec![text("ASUS", 12.0, true, Color::white())],
        )
        .keyed("logo-fallback"),
    };

    let title = Node::view(
        Style {
            flex: Some(1.0),
            gap: Some(2.0),
            ..Default::default()
        },
        vec![
            text("ASUS COMMERCIAL PARTNER PROGRAM", 18.0, true, Color::hex(BRAND)),
            text("FORM PENDAFTARAN ACP", 12.0, false, Color::hex(MUTED)),
        ],
    );

    let meta = Node::view(
        Style {
            cross_align: Some(CrossAlign::End),
            ..Default::default()
        },
        vec![
            text(
                format!("Tanggal: {}", format_date_id(now)),
                12.0,
                false,
                Color::hex(MUTED),
            ),
            text(
                format!("ID: {}", record.id.as_deref().unwrap_or("N/A")),
                12.0,
                false,
                Color::hex(MUTED),
            )
            .keyed("record-id"),
        ],
    );

    Node::view(
        Style {
            direction: Some(Direction::Row),
            cross_align: Some(CrossAlign::Center),
            gap: Some(20.0),
            margin_bottom: Some(30.0),
            padding_bottom: Some(20.0),
            border_bottom: Some(BorderSide {
                width: 2.0,
                color: Color::hex(BRAND),
            }),
            ..Default::default()
        },
        vec![logo_node, title, meta],
    )
}

fn company_section(record: &RegistrationRecord) -> Node {
    section(
        "INFORMASI PERUSAHAAN",
        vec![
            two_columns(
                field("Nama ACP", &record.acp_name),
                field("Kota", &record.city),
            ),
            field("Alamat", &record.acp_address),
            two_columns(
                field("Provinsi", &record.state),
                field("Kode Pos", &record.post_code),
            ),
            two_columns(
                field("Telepon", &record.telephone_no),
                field("Fax", &record.fax_no),
            ),
        ],
    )
}

fn photo_section(url: &str) -> Node {
    let panel = Node::view(
        Style {
            padding: Some(20.0),
            gap: Some(5.0),
            cross_align: Some(CrossAlign::Center),
            background_color: Some(Color::hex(PANEL)),
            border: Some(BorderSide {
                width: 1.0,
                color: Color::hex(RULE),
            }),
            ..Default::default()
        },
        vec![
            text("Foto toko tersedia di:", 12.0, false, Color::hex(MUTED)),
            text(url, 10.0, false, Color::hex(BRAND)).keyed("photo-url"),
        ],
    );
    section("FOTO TOKO", vec![panel])
}

fn legal_section(record: &RegistrationRecord) -> Node {
    section(
        "INFORMASI LEGAL",
        vec![
            two_columns(
                field("No. KTP", &record.id_card_no),
                field("NPWP", &record.tax_id),
            ),
            two_columns(field("NIB", &record.sbn_nib), field("PKP", &record.pkp)),
        ],
    )
}

fn contact_section(record: &RegistrationRecord) -> Node {
    let header_style = Style {
        background_color: Some(Color::hex("#f5f5f5")),
        ..Default::default()
    };
    let header = Node::row(
        header_style,
        ["Tipe Kontak", "Nama", "Telepon", "Email", "WhatsApp"]
            .into_iter()
            .map(|h| table_cell(h, true))
            .collect(),
    );

    let mut rows = vec![header];
    rows.extend(record.populated_contacts().map(contact_row));

    let table = Node::table(
        vec![
            Dimension::Percent(16.0),
            Dimension::Percent(20.0),
            Dimension::Percent(18.0),
            Dimension::Percent(28.0),
            Dimension::Percent(18.0),
        ],
        Style::default(),
        rows,
    );
    section("INFORMASI KONTAK", vec![table])
}

fn contact_row(contact: &ContactEntry) -> Node {
    Node::row(
        Style::default(),
        vec![
            table_cell(contact.role.label(), contact.role == ContactRole::Owner),
            table_cell(or_placeholder(&contact.name), false),
            table_cell(or_placeholder(&contact.mobile_phone), false),
            table_cell(or_placeholder(&contact.email), false),
            table_cell(or_placeholder(&contact.whatsapp_no), false),
        ],
    )
    .keyed("contact-row")
}

fn claim_section(routing: &ClaimRouting) -> Node {
    let (kind, label, key) = match routing {
        ClaimRouting::Distributor { .. } => ("Distributor", "Nama Distributor", "claim-distributor"),
        ClaimRouting::MasterDealer { .. } => {
            ("Master Dealer", "Nama Master Dealer", "claim-master-dealer")
        }
    };

    let panel = Node::view(
        Style {
            padding: Some(15.0),
            gap: Some(10.0),
            background_color: Some(Color::hex(PANEL)),
            ..Default::default()
        },
        vec![
            inline_pair("Klaim ke:", kind, Color::hex(BRAND)),
            inline_pair(
                &format!("{}:", label),
                or_placeholder(routing.name()),
                Color::hex(HEADING),
            )
            .keyed(key),
        ],
    );
    section("CLAIM CREDIT NOTE TO", vec![panel])
}

fn agreement_section(agreed: bool) -> Node {
    let (glyph, status, color) = if agreed {
        ("✓", "SETUJU", AGREED)
    } else {
        ("✗", "TIDAK SETUJU", DECLINED)
    };

    let panel = Node::view(
        Style {
            direction: Some(Direction::Row),
            cross_align: Some(CrossAlign::Center),
            gap: Some(10.0),
            padding: Some(15.0),
            background_color: Some(Color::hex(PANEL)),
            ..Default::default()
        },
        vec![
            text(format!("{} {}", glyph, status), 18.0, true, Color::hex(color)),
            Node::view(
                Style {
                    flex: Some(1.0),
                    ..Default::default()
                },
                vec![text(
                    "Saya setuju untuk bergabung dengan ASUS Commercial Partner",
                    14.0,
                    false,
                    Color::hex(HEADING),
                )],
            ),
        ],
    )
    .keyed("agreement-indicator");
    section("PERSETUJUAN", vec![panel])
}

fn footer(now: DateTime<Utc>) -> Node {
    let centered = |s: String| {
        let mut node = text(s, 11.0, false, Color::hex(MUTED));
        node.style.text_align = Some(TextAlign::Center);
        node
    };
    Node::view(
        Style {
            margin_top: Some(30.0),
            gap: Some(5.0),
            ..Default::default()
        },
        vec![
            rule(),
            centered(format!("© {} ASUS. All rights reserved.", now.year())),
            centered(
                "Dokumen ini dibuat secara otomatis dari sistem pendaftaran ASUS Commercial Partner"
                    .to_string(),
            ),
        ],
    )
}

// ============================================================================
// BUILDING BLOCKS
// ============================================================================

fn section(title: &str, body: Vec<Node>) -> Node {
    let heading = Node::view(
        Style {
            padding_bottom: Some(5.0),
            margin_bottom: Some(15.0),
            border_bottom: Some(BorderSide {
                width: 1.0,
                color: Color::hex(RULE),
            }),
            ..Default::default()
        },
        vec![text(title, 16.0, true, Color::hex(HEADING))],
    );

    let mut children = vec![heading];
    children.extend(body);
    Node::view(
        Style {
            margin_bottom: Some(25.0),
            ..Default::default()
        },
        children,
    )
}

fn field(label: &str, value: &str) -> Node {
    let value_box = Node::view(
        Style {
            padding_bottom: Some(5.0),
            margin_bottom: Some(10.0),
            border_bottom: Some(BorderSide {
                width: 1.0,
                color: Color::hex(FAINT_RULE),
            }),
            ..Default::default()
        },
        vec![text(or_placeholder(value), 14.0, false, Color::black())],
    );
    Node::view(
        Style::default(),
        vec![
            text(format!("{}:", label), 12.0, true, Color::hex(LABEL)),
            value_box,
        ],
    )
}

fn two_columns(left: Node, right: Node) -> Node {
    let column = |child: Node| {
        Node::view(
            Style {
                flex: Some(1.0),
                ..Default::default()
            },
            vec![child],
        )
    };
    Node::view(
        Style {
            direction: Some(Direction::Row),
            gap: Some(15.0),
            ..Default::default()
        },
        vec![column(left), column(right)],
    )
}

fn inline_pair(label: &str, value: &str, value_color: Color) -> Node {
    Node::view(
        Style {
            direction: Some(Direction::Row),
            gap: Some(6.0),
            cross_align: Some(CrossAlign::Start),
            ..Default::default()
        },
        vec![
            text(label, 14.0, true, Color::hex(HEADING)),
            Node::view(
                Style {
                    flex: Some(1.0),
                    ..Default::default()
                },
                vec![text(value, 14.0, true, value_color)],
            ),
        ],
    )
}

fn table_cell(value: &str, bold: bool) -> Node {
    let mut content = text(value, 12.0, bold, Color::hex(HEADING));
    content.style.line_height = Some(1.3);
    Node::cell(
        Style {
            padding: Some(8.0),
            border: Some(BorderSide {
                width: 1.0,
                color: Color::hex(RULE),
            }),
            ..Default::default()
        },
        vec![content],
    )
}

fn rule() -> Node {
    Node::view(
        Style {
            height: Some(Dimension::Px(1.0)),
            margin_bottom: Some(15.0),
            background_color: Some(Color::hex(RULE)),
            ..Default::default()
        },
        Vec::new(),
    )
}

fn text(value: impl Into<String>, size: f32, bold: bool, color: Color) -> Node {
    Node::text(
        value,
        Style {
            font_size: Some(size),
            font_weight: Some(if bold {
                FontWeight::Bold
            } else {
                FontWeight::Normal
            }),
            color: Some(color),
            ..Default::default()
        },
    )
}

fn or_placeholder(value: &str) -> &str {
    if value.trim().is_empty() {
        PLACEHOLDER
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::EmbeddedAsset;
    use crate::normalize::normalize_record;
    use crate::registration::tests::sample_record;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
    }

    fn render(record: &RegistrationRecord) -> RenderableDocument {
        render_registration(
            &normalize_record(record),
            &Asset::Unavailable("offline".into()),
            now(),
        )
    }

    #[test]
    fn only_populated_contacts_get_rows() {
        let doc = render(&sample_record());
        let rows = doc.root.find_all("contact-row");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].plain_text().starts_with("Owner JOHN DOE"));
    }

    #[test]
    fn distributor_routing_shows_only_the_distributor_line() {
        let doc = render(&sample_record());
        let lines = doc.root.find_all("claim-distributor");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].plain_text().contains("PT. SYNNEX METRODATA INDONESIA"));
        assert!(doc.root.find_all("claim-master-dealer").is_empty());
    }

    #[test]
    fn master_dealer_routing_shows_only_the_master_dealer_line() {
        let mut record = sample_record();
        record.claim_routing = ClaimRouting::MasterDealer {
            name: "Toko Sejahtera".into(),
        };
        let doc = render(&record);
        let lines = doc.root.find_all("claim-master-dealer");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].plain_text().contains("TOKO SEJAHTERA"));
        assert!(doc.root.find_all("claim-distributor").is_empty());
    }

    #[test]
    fn agreement_indicator_follows_the_flag() {
        let doc = render(&sample_record());
        let indicator = doc.root.find_all("agreement-indicator")[0];
        assert!(indicator.plain_text().starts_with("✓ SETUJU"));
        assert_eq!(indicator.children[0].style.color, Some(Color::hex(AGREED)));

        let mut record = sample_record();
        record.agreement = false;
        let doc = render(&record);
        let indicator = doc.root.find_all("agreement-indicator")[0];
        assert!(indicator.plain_text().starts_with("✗ TIDAK SETUJU"));
        assert_eq!(indicator.children[0].style.color, Some(Color::hex(DECLINED)));
    }

    #[test]
    fn unavailable_logo_uses_the_fallback_block() {
        let doc = render(&sample_record());
        assert_eq!(doc.root.find_all("logo-fallback").len(), 1);
        assert!(doc.root.find_all("logo").is_empty());

        let logo = Asset::Embedded(EmbeddedAsset {
            mime: "image/png",
            data_url: "data:image/png;base64,AAAA".into(),
        });
        let doc = render_registration(&sample_record(), &logo, now());
        assert_eq!(doc.root.find_all("logo").len(), 1);
        assert!(doc.root.find_all("logo-fallback").is_empty());
    }

    #[test]
    fn missing_values_render_a_dash_and_missing_id_reads_na() {
        let mut record = sample_record();
        record.fax_no.clear();
        record.id = None;
        record.photo_url = None;
        let doc = render(&record);

        assert!(doc.root.plain_text().contains("Fax: -"));
        assert_eq!(doc.root.find_all("record-id")[0].plain_text(), "ID: N/A");
        assert!(doc.root.find_all("photo-url").is_empty());
    }

    #[test]
    fn dates_use_indonesian_month_names() {
        assert_eq!(format_date_id(now()), "19 Oktober 2026");
        let doc = render(&sample_record());
        assert!(doc.root.plain_text().contains("Tanggal: 19 Oktober 2026"));
        assert_eq!(doc.width, NOMINAL_WIDTH_PX);
    }
}
