use photo_metadata::{
    Container as _, Section,
    containers::tiff::{Endianness, Tiff, tag::TagType},
    open, open_path, save_to_path,
    types::HierValue,
};

fn logger() {
    _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::max())
        .format_file(true)
        .format_line_number(true)
        .try_init();
}

fn segment(marker: u8, body: &[u8]) -> Vec<u8> {
    let len = (body.len() + 2) as u16;
    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn signed(marker: u8, signature: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut body = signature.to_vec();
    body.extend_from_slice(payload);
    segment(marker, &body)
}

/// The `(marker, body)` of every segment before the scan.
fn segments(file: &[u8]) -> Vec<(u8, &[u8])> {
    let mut found = Vec::new();
    let mut i = 2;
    loop {
        assert_eq!(file[i], 0xFF, "no marker at `{i}`");
        let marker = file[i + 1];
        if marker == 0xDA {
            return found;
        }
        let len = u16::from_be_bytes([file[i + 2], file[i + 3]]) as usize;
        found.push((marker, &file[i + 4..i + 2 + len]));
        i += 2 + len;
    }
}

const SCAN: &[u8] = &[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9];

const XMP: &str = concat!(
    r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">"#,
    r#"<rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
    r#"<dc:creator><rdf:Seq><rdf:li>Jane Doe</rdf:li></rdf:Seq></dc:creator>"#,
    r#"</rdf:Description></rdf:RDF></x:xmpmeta>"#,
);

/// A fake resource, the IPTC resource with one keyword (`kw1`), and another
/// fake resource.
#[rustfmt::skip]
const PSIR: &[u8] = &[
    0x38, 0x42, 0x49, 0x4D, 0x88, 0x99,
    0x04, b'B', b'l', b'a', b'h', 0x00,
    0x00, 0x00, 0x00, 0x07,
    b'T', b'e', b's', b't', b'i', b'n', b'g', 0x00,
    0x38, 0x42, 0x49, 0x4D, 0x04, 0x04,
    0x00, 0x00,
    0x00, 0x00, 0x00, 0x10,
    0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, 0x25, 0x47,
    0x1C, 0x02, 0x19, 0x00, 0x03, b'k', b'w', b'1',
    0x38, 0x42, 0x49, 0x4D, 0x88, 0xAA,
    0x05, b'B', b'l', b'a', b'h', b'2',
    0x00, 0x00, 0x00, 0x08,
    b'T', b'e', b's', b't', b'i', b'n', b'g', b'2',
];

/// [`PSIR`] after setting the keywords to `new1` and `new2`, and the title
/// to `me`.
#[rustfmt::skip]
const PSIR_EDITED: &[u8] = &[
    0x38, 0x42, 0x49, 0x4D, 0x88, 0x99,
    0x04, b'B', b'l', b'a', b'h', 0x00,
    0x00, 0x00, 0x00, 0x07,
    b'T', b'e', b's', b't', b'i', b'n', b'g', 0x00,
    0x38, 0x42, 0x49, 0x4D, 0x04, 0x04,
    0x00, 0x00,
    0x00, 0x00, 0x00, 0x21,
    0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, 0x25, 0x47,
    0x1C, 0x02, 0x05, 0x00, 0x02, b'm', b'e',
    0x1C, 0x02, 0x19, 0x00, 0x04, b'n', b'e', b'w', b'1',
    0x1C, 0x02, 0x19, 0x00, 0x04, b'n', b'e', b'w', b'2',
    0x00,
    0x38, 0x42, 0x49, 0x4D, 0x04, 0x25,
    0x00, 0x00,
    0x00, 0x00, 0x00, 0x10,
    0x24, 0xB3, 0x09, 0x1A, 0xCD, 0x57, 0x4B, 0x06,
    0x57, 0xB1, 0xA5, 0xCC, 0xB0, 0xAB, 0xF4, 0xA6,
    0x38, 0x42, 0x49, 0x4D, 0x88, 0xAA,
    0x05, b'B', b'l', b'a', b'h', b'2',
    0x00, 0x00, 0x00, 0x08,
    b'T', b'e', b's', b't', b'i', b'n', b'g', b'2',
];

const ICC: &[u8] = b"ICC_PROFILE\0\x01\x01not really a profile";
const COMMENT: &[u8] = b"made by hand";

fn exif() -> Vec<u8> {
    let mut tiff = Tiff::new(Endianness::Big);
    tiff.ifd0_mut()
        .add_tag(0x10E, TagType::Ascii)
        .set_string("Waves at the pier");
    tiff.layout().unwrap();

    let mut out = Vec::new();
    tiff.write(&mut out).unwrap();
    out
}

/// A JPEG with EXIF, XMP, and Photoshop payloads, between segments we don't
/// know.
fn sample() -> Vec<u8> {
    let mut file = vec![0xFF, 0xD8];
    file.extend(signed(0xE1, b"Exif\0\0", &exif()));
    file.extend(signed(0xE1, b"http://ns.adobe.com/xap/1.0/\0", XMP.as_bytes()));
    file.extend(segment(0xE2, ICC));
    file.extend(signed(0xED, b"Photoshop 3.0\0", PSIR));
    file.extend(segment(0xFE, COMMENT));
    file.extend(segment(0xDB, &[0; 5]));
    file.extend(SCAN);
    file
}

fn save(handler: &mut dyn photo_metadata::FileHandler) -> Vec<u8> {
    let mut out = Vec::new();
    handler.save(&mut out).unwrap();
    out
}

/// A file with no edits comes back byte-for-byte.
#[test]
fn untouched_jpeg_is_copied() {
    logger();

    let file = sample();
    let mut handler = open(Section::from_bytes(file.clone())).unwrap();

    let p = handler.provider();
    assert_eq!(p.caption(), "Waves at the pier");
    assert_eq!(p.creator(), "Jane Doe");
    assert_eq!(p.keywords(), [HierValue::from_labels(["kw1"])]);
    assert!(!handler.dirty());

    assert_eq!(save(handler.as_mut()), file);
}

/// Segments we don't know about survive an edit, in their original order
/// after the payloads.
#[test]
fn foreign_segments_survive_edits() {
    logger();

    let mut handler = open(Section::from_bytes(sample())).unwrap();
    handler
        .provider_mut()
        .set_caption("Waves at the old pier")
        .unwrap();
    assert!(handler.dirty());

    let saved = save(handler.as_mut());
    let found = segments(&saved);
    let markers: Vec<u8> = found.iter().map(|(m, _)| *m).collect();
    assert_eq!(markers, [0xE1, 0xE1, 0xED, 0xE2, 0xFE, 0xDB]);
    assert!(found.contains(&(0xE2, ICC)));
    assert!(found.contains(&(0xFE, COMMENT)));
    assert!(found.contains(&(0xDB, &[0; 5][..])));
    assert!(saved.ends_with(SCAN));

    let handler = open(Section::from_bytes(saved)).unwrap();
    let p = handler.provider();
    assert_eq!(p.caption(), "Waves at the old pier");
    assert!(
        p.caption_tags()
            .iter()
            .all(|(_, c)| c.is_empty() || c == "Waves at the old pier")
    );
    assert_eq!(p.creator(), "Jane Doe");
}

/// An EXIF block whose last datum, `keep\0`, has an odd length and ends the
/// block with no pad byte.
#[rustfmt::skip]
const EXIF_ODD_TRAILER: &[u8] = &[
    0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00,
    0x02, 0x00,
    0x0E, 0x01, 0x02, 0x00, 0x05, 0x00, 0x00, 0x00, 0x26, 0x00, 0x00, 0x00,
    0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    b'k', b'e', b'e', b'p', 0x00,
];

/// Shrinking or clearing that last datum renders as many bytes as planned.
#[test]
fn odd_exif_trailer_can_be_edited() {
    logger();

    let mut file = vec![0xFF, 0xD8];
    file.extend(signed(0xE1, b"Exif\0\0", EXIF_ODD_TRAILER));
    file.extend(SCAN);

    for caption in ["kep", ""] {
        let mut handler = open(Section::from_bytes(file.clone())).unwrap();
        assert_eq!(handler.provider().caption(), "keep");
        handler.provider_mut().set_caption(caption).unwrap();

        let mut out = Vec::new();
        let count = handler.save(&mut out).unwrap();
        assert_eq!(count, out.len() as u64);

        let handler = open(Section::from_bytes(out)).unwrap();
        assert_eq!(handler.provider().caption(), caption);
        let tags = handler.provider().caption_tags();
        assert!(tags.contains(&("IFD0 ImageDescription".to_string(), caption.to_string())));
    }
}

/// Editing the IPTC block re-renders its resource and adds its MD5, leaving
/// the other resources as they were.
#[test]
fn iptc_edits_carry_a_fresh_hash() {
    logger();

    let mut file = vec![0xFF, 0xD8];
    file.extend(signed(0xED, b"Photoshop 3.0\0", PSIR));
    file.extend(SCAN);

    let mut handler = open(Section::from_bytes(file)).unwrap();
    let p = handler.provider_mut();
    p.set_keywords(&[
        HierValue::from_labels(["new1"]),
        HierValue::from_labels(["new2"]),
    ])
    .unwrap();
    p.set_title("me").unwrap();

    let saved = save(handler.as_mut());
    let psir: Vec<&[u8]> = segments(&saved)
        .into_iter()
        .filter(|(m, _)| *m == 0xED)
        .map(|(_, body)| body)
        .collect();
    assert_eq!(psir.len(), 1);
    assert_eq!(psir[0].strip_prefix(b"Photoshop 3.0\0"), Some(PSIR_EDITED));
}

/// Saving to a path goes through a temporary file, which is gone afterward.
#[test]
fn saves_to_a_path() {
    logger();

    let dir = std::env::temp_dir().join(format!("photo_metadata-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("pier.jpg");
    std::fs::write(&path, sample()).unwrap();

    let mut handler = open_path(&path).unwrap();
    handler.provider_mut().set_title("The pier").unwrap();
    save_to_path(handler.as_mut(), &path).unwrap();
    drop(handler);

    assert!(!dir.join(".pier.jpg.TEMP").exists());
    let handler = open_path(&path).unwrap();
    assert_eq!(handler.provider().title(), "The pier");
    assert_eq!(handler.provider().caption(), "Waves at the pier");
    drop(handler);

    std::fs::remove_dir_all(&dir).unwrap();
}

/// Each format goes to its own handler, and anything else is refused.
#[test]
fn formats_are_sniffed() {
    logger();

    let mut tiff = exif();
    let mut handler = open(Section::from_bytes(tiff.clone())).unwrap();
    assert_eq!(handler.provider().caption(), "Waves at the pier");
    assert_eq!(save(handler.as_mut()), tiff);

    let handler = open(Section::from_bytes(XMP.as_bytes())).unwrap();
    assert_eq!(handler.provider().creator(), "Jane Doe");

    tiff[..4].copy_from_slice(b"GIF8");
    assert!(open(Section::from_bytes(tiff)).is_err());
}
