//! End-to-end decryption of the sample documents

use pdf_decrypter::pdf::{Document, Marker, ObjectId, ObjectKey, StreamCodec, Value, XRefTable};
use pdf_decrypter::security::{AuthState, PasswordType};
use pdf_decrypter::{decrypt, verify, PDFDecryptError, PDFDecryptResult, PDFDecrypter};
use pretty_assertions::assert_eq;
use rstest::rstest;

const R2_RC4_40: &[u8] = include_bytes!("samples/r2_rc4_40.pdf");
const R3_INCREMENTAL: &[u8] = include_bytes!("samples/r3_rc4_128_incremental.pdf");
const R4_AES128: &[u8] = include_bytes!("samples/r4_aes128.pdf");
const R5_METADATA: &[u8] = include_bytes!("samples/r5_aes256_metadata.pdf");
const R6_XREF_STREAM: &[u8] = include_bytes!("samples/r6_aes256_xref_stream.pdf");
const LINEARIZED: &[u8] = include_bytes!("samples/linearized_rc4_128.pdf");

const CONTENT: &[u8] = b"BT /F1 24 Tf 72 700 Td (Hello, decrypted world!) Tj ET";
const METADATA: &[u8] =
    b"<?xpacket begin=\"\"?><x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/><?xpacket end=\"w\"?>";
const METADATA_V1: &[u8] = b"<?xpacket begin=\"\"?><x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><rdf:RDF/></x:xmpmeta>\
                              <?xpacket end=\"w\"?>               ";
const METADATA_V2: &[u8] = b"<?xpacket begin=\"\"?><x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><rdf:RDF>rev 2</rdf:RDF>\
                              </x:xmpmeta><?xpacket end=\"w\"?> ";

/// Copy of `source` with the first occurrence of `from` replaced by `to`
fn patched(source: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let at = source
        .windows(from.len())
        .position(|w| w == from)
        .unwrap_or_else(|| panic!("{:?} not found", String::from_utf8_lossy(from)));
    let mut out = source[..at].to_vec();
    out.extend_from_slice(to);
    out.extend_from_slice(&source[at + from.len()..]);
    out
}

fn starts_object(output: &[u8], offset: usize, number: u32) -> bool {
    output
        .get(offset..)
        .is_some_and(|rest| rest.starts_with(format!("{} 0 obj", number).as_bytes()))
}

fn info_string(document: &Document, key: &str) -> Option<Vec<u8>> {
    let info = document.object(5)?.dictionary()?;
    info.get_bytes(key).map(<[u8]>::to_vec)
}

/// Every in-use entry of every table section points at its object
fn check_xref_tables(output: &[u8], document: &Document) -> PDFDecryptResult<usize> {
    let mut checked = 0;
    for (key, object) in document.objects() {
        if key.id != ObjectId::Marker(Marker::Xref) {
            continue;
        }
        let table = XRefTable::parse(object.value().unwrap_or_default())?;
        for subsection in table.subsections() {
            for (i, entry) in subsection.entries.iter().enumerate() {
                let number = subsection.start + i as u32;
                if entry.in_use {
                    assert!(
                        starts_object(output, entry.offset as usize, number),
                        "xref entry for {} points at {}",
                        number,
                        entry.offset
                    );
                    checked += 1;
                }
            }
        }
    }
    Ok(checked)
}

/// Type 1 records of a cross-reference stream, as (number, offset)
fn xref_stream_records(document: &Document, number: u32) -> PDFDecryptResult<Vec<(u32, usize)>> {
    let object = document.resolve(number)?;
    let dictionary = object.dictionary().cloned().unwrap_or_default();
    let widths: Vec<usize> = dictionary
        .get_array("W")
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_integer)
        .map(|w| w as usize)
        .collect();
    let rows = StreamCodec::from_dictionary(&dictionary)?.decode(object.stream().unwrap_or_default())?;

    let field = |bytes: &[u8]| bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
    let record_len: usize = widths.iter().sum();
    let mut records = Vec::new();
    for (i, record) in rows.chunks(record_len).enumerate() {
        let kind = field(&record[..widths[0]]);
        let offset = field(&record[widths[0]..widths[0] + widths[1]]);
        if kind == 1 {
            records.push((i as u32, offset));
        }
    }
    Ok(records)
}

fn addresses(document: &Document) -> Vec<ObjectKey> {
    document.objects().map(|(key, _)| *key).collect()
}

#[rstest]
#[case::rc4_40_user(R2_RC4_40, "user")]
#[case::rc4_40_owner(R2_RC4_40, "owner")]
#[case::aes_128_user(R4_AES128, "")]
#[case::aes_128_owner(R4_AES128, "owner")]
#[case::aes_256_user(R6_XREF_STREAM, "user")]
#[case::aes_256_owner(R6_XREF_STREAM, "owner")]
#[case::aes_256_r5_user(R5_METADATA, "user")]
#[case::aes_256_r5_owner(R5_METADATA, "owner")]
#[case::linearized(LINEARIZED, "user")]
fn test_content_stream_decrypted(#[case] source: &[u8], #[case] password: &str) -> PDFDecryptResult<()> {
    let output = decrypt(source, password.as_bytes())?;
    let document = Document::parse(&output)?;
    let content_number = if source == LINEARIZED { 5 } else { 4 };
    assert_eq!(document.resolve(content_number)?.stream(), Some(CONTENT));
    assert!(document.encrypt_entry().is_none());
    Ok(())
}

#[rstest]
#[case(R2_RC4_40)]
#[case(R3_INCREMENTAL)]
#[case(R4_AES128)]
#[case(R5_METADATA)]
#[case(R6_XREF_STREAM)]
#[case(LINEARIZED)]
fn test_wrong_password_rejected(#[case] source: &[u8]) {
    assert!(matches!(decrypt(source, b"not the password"), Err(PDFDecryptError::AuthenticationFailed)));
}

#[rstest]
#[case(R2_RC4_40, "owner", Some(PasswordType::Owner))]
#[case(R2_RC4_40, "user", Some(PasswordType::User))]
#[case(R3_INCREMENTAL, "owner", Some(PasswordType::Owner))]
#[case(R3_INCREMENTAL, "user", Some(PasswordType::User))]
#[case(R3_INCREMENTAL, "User", None)]
#[case(R4_AES128, "", Some(PasswordType::User))]
#[case(R4_AES128, "owner", Some(PasswordType::Owner))]
#[case(R5_METADATA, "owner", Some(PasswordType::Owner))]
#[case(R5_METADATA, "user", Some(PasswordType::User))]
#[case(R5_METADATA, "owner\0", None)]
#[case(R6_XREF_STREAM, "owner", Some(PasswordType::Owner))]
#[case(R6_XREF_STREAM, "user", Some(PasswordType::User))]
#[case(R6_XREF_STREAM, "", None)]
fn test_password_classification(
    #[case] source: &[u8],
    #[case] password: &str,
    #[case] expected: Option<PasswordType>,
) -> PDFDecryptResult<()> {
    let mut decrypter = PDFDecrypter::new();
    decrypter.set_document_content(source);
    decrypter.set_password(password);
    assert_eq!(decrypter.verify_password()?, expected.is_some());

    let handler = decrypter.security_handler();
    assert_eq!(handler.and_then(|h| h.password().kind()), expected);
    let state = match expected {
        Some(PasswordType::Owner) => AuthState::OwnerAuthenticated,
        Some(PasswordType::User) => AuthState::UserAuthenticated,
        None => AuthState::Failed,
    };
    assert_eq!(handler.map(|h| h.state()), Some(state));
    Ok(())
}

#[test_log::test]
fn test_owner_login_recovers_user_password() -> PDFDecryptResult<()> {
    for (source, user) in [(R2_RC4_40, &b"user"[..]), (R3_INCREMENTAL, b"user"), (R4_AES128, b"")] {
        let mut decrypter = PDFDecrypter::new();
        decrypter.set_document_content(source);
        decrypter.set_password("owner");
        assert!(decrypter.verify_password()?);
        assert_eq!(
            decrypter.security_handler().and_then(|h| h.recovered_user_password()),
            Some(user)
        );
    }
    Ok(())
}

#[test_log::test]
fn test_verify_is_repeatable() -> PDFDecryptResult<()> {
    let mut decrypter = PDFDecrypter::new();
    decrypter.set_document_content(R3_INCREMENTAL);
    decrypter.set_password("user");
    assert!(decrypter.verify_password()?);
    assert!(decrypter.verify_password()?);
    assert!(verify(R3_INCREMENTAL, b"owner")?);
    assert!(!verify(R3_INCREMENTAL, b"guest")?);
    Ok(())
}

#[test_log::test]
fn test_rc4_40_strings() -> PDFDecryptResult<()> {
    let output = decrypt(R2_RC4_40, b"user")?;
    let document = Document::parse(&output)?;

    assert_eq!(info_string(&document, "Title"), Some(b"R2 (RC4-40) sample".to_vec()));
    assert_eq!(info_string(&document, "Author"), Some(b"Fixture Author".to_vec()));
    assert_eq!(document.resolve(7)?.value(), Some(&b"[(array item) 42 /Name]"[..]));
    assert_eq!(document.resolve(8)?.value(), Some(&b"(standalone string)"[..]));
    assert!(document.object(6).is_none());
    Ok(())
}

#[test_log::test]
fn test_incremental_update() -> PDFDecryptResult<()> {
    let output = decrypt(R3_INCREMENTAL, b"user")?;
    let document = Document::parse(&output)?;

    assert_eq!(info_string(&document, "Title"), Some(b"Updated title".to_vec()));
    assert_eq!(info_string(&document, "Author"), Some(b"Second Author".to_vec()));

    let older: Vec<_> = document
        .objects()
        .filter(|(key, _)| key.id == ObjectId::Number(5) && !key.is_live())
        .map(|(_, object)| object.dictionary().and_then(|d| d.get_bytes("Title")).map(<[u8]>::to_vec))
        .collect();
    assert_eq!(older, vec![Some(b"Original title".to_vec())]);

    assert_eq!(document.xref().chain.len(), 2);
    assert!(check_xref_tables(&output, &document)? > 0);

    // Prev of the newest trailer points at the older section
    let trailer = document
        .get(&ObjectKey::marker(Marker::Trailer))
        .and_then(|t| t.dictionary())
        .cloned()
        .unwrap_or_default();
    let prev = trailer.get_integer("Prev").unwrap_or_default() as usize;
    assert!(output[prev..].starts_with(b"xref"));
    Ok(())
}

#[test_log::test]
fn test_aes_128_document() -> PDFDecryptResult<()> {
    let output = decrypt(R4_AES128, b"")?;
    let document = Document::parse(&output)?;

    assert_eq!(info_string(&document, "Title"), Some(b"AES-128 sample".to_vec()));
    assert_eq!(document.resolve(9)?.stream(), Some(METADATA));

    let annotation = document.resolve(7)?.dictionary().cloned().unwrap_or_default();
    assert_eq!(annotation.get_bytes("Contents"), Some(&b"Annotation text"[..]));
    let signature = annotation.get_dictionary("V").cloned().unwrap_or_default();
    assert_eq!(
        signature.get_bytes("Contents").map(hex::encode_upper),
        Some("3082010A0282010100C0FFEE".to_string())
    );
    assert_eq!(signature.get_bytes("M"), Some(&b"D:20240101000000Z"[..]));

    let items = Value::parse(document.resolve(8)?.value().unwrap_or_default())?;
    let items: Vec<_> = items.as_array().unwrap_or_default().iter().filter_map(Value::as_bytes).collect();
    assert_eq!(items, vec![&b"first"[..], &b"second"[..]]);

    assert!(check_xref_tables(&output, &document)? >= 8);
    Ok(())
}

#[test_log::test]
fn test_xref_stream_offsets() -> PDFDecryptResult<()> {
    let output = decrypt(R6_XREF_STREAM, b"owner")?;
    let document = Document::parse(&output)?;

    assert_eq!(info_string(&document, "Title"), Some(b"AES-256 sample".to_vec()));
    let xref = document.resolve(7)?;
    assert!(xref.is_xref_stream());
    assert!(!xref.dictionary().is_some_and(|d| d.contains_key("Encrypt")));

    let records = xref_stream_records(&document, 7)?;
    let numbers: Vec<u32> = records.iter().map(|(n, _)| *n).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 7]);
    for (number, offset) in records {
        assert!(starts_object(&output, offset, number), "record {} points at {}", number, offset);
    }

    let startxref = document
        .get(&ObjectKey::marker(Marker::StartXref))
        .and_then(|o| o.value())
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or_default();
    assert!(starts_object(&output, startxref, 7));
    Ok(())
}

#[test_log::test]
fn test_r5_plaintext_metadata_revisions() -> PDFDecryptResult<()> {
    let output = decrypt(R5_METADATA, b"owner")?;
    let document = Document::parse(&output)?;

    assert_eq!(info_string(&document, "Title"), Some(b"AES-256 R5 sample".to_vec()));
    assert_eq!(document.resolve(7)?.stream(), Some(METADATA_V2));

    let older: Vec<_> = document
        .objects()
        .filter(|(key, _)| key.id == ObjectId::Number(7) && !key.is_live())
        .map(|(_, object)| object.stream().map(<[u8]>::to_vec))
        .collect();
    assert_eq!(older, vec![Some(METADATA_V1.to_vec())]);
    assert!(check_xref_tables(&output, &document)? >= 7);
    Ok(())
}

#[rstest]
#[case::user_key_entry(&b"/UE"[..], &b"/UX"[..], "user")]
#[case::owner_key_entry(&b"/OE"[..], &b"/OX"[..], "owner")]
fn test_missing_file_key_entry(#[case] entry: &[u8], #[case] renamed: &[u8], #[case] password: &str) {
    let source = patched(R6_XREF_STREAM, entry, renamed);
    assert!(matches!(
        decrypt(&source, password.as_bytes()),
        Err(PDFDecryptError::DecryptionUnavailable(_))
    ));
}

#[test_log::test]
fn test_unsupported_xref_stream_predictor() {
    let source = patched(R6_XREF_STREAM, b"/Predictor 12", b"/Predictor 15");
    assert!(matches!(decrypt(&source, b"user"), Err(PDFDecryptError::UnsupportedPredictor(15))));
}

#[test_log::test]
fn test_oversized_xref_count() {
    let source = patched(R2_RC4_40, b"xref\n0 9\n", b"xref\n0 2000000000\n");
    match decrypt(&source, b"user") {
        // the section cannot be rebuilt, so it is written back as it was
        Ok(output) => assert!(output.windows(13).any(|w| w == b"\n0 2000000000")),
        Err(e) => assert!(matches!(e, PDFDecryptError::MalformedPDF(_)), "unexpected error {}", e),
    }
}

#[test_log::test]
fn test_linearized_length() -> PDFDecryptResult<()> {
    let output = decrypt(LINEARIZED, b"owner")?;
    let document = Document::parse(&output)?;
    let first = document.resolve(1)?.dictionary().cloned().unwrap_or_default();
    assert_eq!(first.get_integer("L"), Some(output.len() as i64));
    assert!(check_xref_tables(&output, &document)? >= 5);
    Ok(())
}

#[rstest]
#[case(R2_RC4_40, "user")]
#[case(R3_INCREMENTAL, "user")]
#[case(R4_AES128, "")]
#[case(R5_METADATA, "user")]
#[case(R6_XREF_STREAM, "user")]
#[case(LINEARIZED, "user")]
fn test_addresses_preserved(#[case] source: &[u8], #[case] password: &str) -> PDFDecryptResult<()> {
    let original = Document::parse(source)?;
    let encrypt = original.encrypt_object().map(|key| key.id);
    let expected: Vec<ObjectKey> = addresses(&original)
        .into_iter()
        .filter(|key| Some(key.id) != encrypt)
        .collect();

    let output = decrypt(source, password.as_bytes())?;
    let decrypted = Document::parse(&output)?;
    assert_eq!(addresses(&decrypted), expected);
    assert!(output.starts_with(original.header()));
    assert!(matches!(decrypt(&output, password.as_bytes()), Err(PDFDecryptError::NotEncrypted)));
    Ok(())
}

#[test_log::test]
fn test_open_file() -> PDFDecryptResult<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("protected.pdf");
    std::fs::write(&path, R2_RC4_40)?;

    let mut decrypter = PDFDecrypter::new();
    decrypter.open_file(&path)?;
    decrypter.set_password("owner");
    assert_eq!(decrypter.filename(), "protected.pdf");
    let output = decrypter.decrypt()?;
    assert_eq!(Document::parse(&output)?.resolve(4)?.stream(), Some(CONTENT));
    Ok(())
}
