//! Fixed package parts: content types, relationships, styles and settings

pub mod namespaces {
    pub const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
    pub const R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    pub const PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
    pub const CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
}

pub mod relationship_types {
    pub const DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const SETTINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings";
}

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Body font and its size in half-points.
pub const BODY_FONT: &str = "Times New Roman";
pub const BODY_SIZE_HALF_POINTS: u32 = 24;

/// Heading sizes in half-points, h1 (24pt) down to h6 (12pt).
pub const HEADING_SIZES: [u32; 6] = [48, 40, 32, 28, 26, 24];

pub fn content_types_xml() -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<Types xmlns="{}">"#, namespaces::CT));
    xml.push_str(
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    );
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    let overrides = [
        (
            "/word/document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        ),
        (
            "/word/styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
        ),
        (
            "/word/settings.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml",
        ),
    ];
    for (part, content_type) in overrides {
        xml.push_str(&format!(
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn relationships_xml(rels: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<Relationships xmlns="{}">"#, namespaces::PKG_REL));
    for (id, rel_type, target) in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id, rel_type, target
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

pub fn root_rels_xml() -> String {
    relationships_xml(&[("rId1", relationship_types::DOCUMENT, "word/document.xml")])
}

pub fn document_rels_xml() -> String {
    relationships_xml(&[
        ("rId1", relationship_types::STYLES, "styles.xml"),
        ("rId2", relationship_types::SETTINGS, "settings.xml"),
    ])
}

pub fn settings_xml() -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<w:settings xmlns:w="{}">"#, namespaces::W));
    xml.push_str(r#"<w:defaultTabStop w:val="720"/>"#);
    xml.push_str(r#"<w:characterSpacingControl w:val="doNotCompress"/>"#);
    xml.push_str(r#"<w:compat><w:compatSetting w:name="compatibilityMode" w:uri="http://schemas.microsoft.com/office/word" w:val="15"/></w:compat>"#);
    xml.push_str("</w:settings>");
    xml
}

fn run_fonts(font: &str) -> String {
    format!(
        r#"<w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:cs="{0}" w:eastAsia="{0}"/>"#,
        font
    )
}

pub fn styles_xml() -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<w:styles xmlns:w="{}">"#, namespaces::W));

    xml.push_str("<w:docDefaults><w:rPrDefault><w:rPr>");
    xml.push_str(&run_fonts(BODY_FONT));
    xml.push_str(&format!(
        r#"<w:sz w:val="{0}"/><w:szCs w:val="{0}"/>"#,
        BODY_SIZE_HALF_POINTS
    ));
    xml.push_str("</w:rPr></w:rPrDefault>");
    xml.push_str(r#"<w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault>"#);
    xml.push_str("</w:docDefaults>");

    xml.push_str(r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#);

    for (i, size) in HEADING_SIZES.iter().enumerate() {
        let level = i + 1;
        xml.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{0}"><w:name w:val="heading {0}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="{1}"/></w:pPr><w:rPr><w:b/><w:bCs/><w:sz w:val="{2}"/><w:szCs w:val="{2}"/></w:rPr></w:style>"#,
            level, i, size
        ));
    }

    xml.push_str(r#"<w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="720" w:right="720"/></w:pPr><w:rPr><w:i/><w:iCs/></w:rPr></w:style>"#);
    xml.push_str(r#"<w:style w:type="paragraph" w:styleId="Preformatted"><w:name w:val="HTML Preformatted"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="0" w:line="240" w:lineRule="auto"/></w:pPr><w:rPr>"#);
    xml.push_str(&run_fonts("Courier New"));
    xml.push_str(r#"<w:sz w:val="20"/><w:szCs w:val="20"/></w:rPr></w:style>"#);
    xml.push_str(r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="60"/></w:pPr></w:style>"#);

    let border = r#"w:val="single" w:sz="4" w:space="0" w:color="000000""#;
    xml.push_str(&format!(
        r#"<w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top {0}/><w:left {0}/><w:bottom {0}/><w:right {0}/><w:insideH {0}/><w:insideV {0}/></w:tblBorders><w:tblCellMar><w:left w:w="80" w:type="dxa"/><w:right w:w="80" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style>"#,
        border
    ));

    xml.push_str("</w:styles>");
    xml
}
