//! vCard 3.0 rendering for collected contacts

use crate::contact::ContactRecord;

/// Render a sequence of records as concatenated vCard 3.0 blocks.
///
/// One block per record in sequence order, each newline-terminated, with no
/// separator between blocks. Fields are inserted verbatim; the export format
/// performs no escaping.
pub fn render_vcards(records: &[ContactRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str("BEGIN:VCARD\n");
        out.push_str("VERSION:3.0\n");
        out.push_str(&format!("FN:{}\n", record.display_name));
        out.push_str(&format!("TEL:{}\n", record.number));
        out.push_str("END:VCARD\n");
    }
    out
}

/// File name for a chat's exported contacts.
pub fn export_filename(chat_id: &str) -> String {
    // Session keys may carry a channel prefix; keep the name filesystem-safe.
    let safe = chat_id.replace([':', '/', '\\'], "_");
    format!("bulk_contacts_{}.vcf", safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_block() {
        let records = vec![ContactRecord::new("Alice", "+15551234")];
        assert_eq!(
            render_vcards(&records),
            "BEGIN:VCARD\nVERSION:3.0\nFN:RT ALICE\nTEL:+15551234\nEND:VCARD\n"
        );
    }

    #[test]
    fn test_render_blocks_in_append_order() {
        let records = vec![
            ContactRecord::new("Alice", "+15551234"),
            ContactRecord::new("bob", "15559999"),
        ];
        let expected = "BEGIN:VCARD\n\
                        VERSION:3.0\n\
                        FN:RT ALICE\n\
                        TEL:+15551234\n\
                        END:VCARD\n\
                        BEGIN:VCARD\n\
                        VERSION:3.0\n\
                        FN:RT BOB\n\
                        TEL:15559999\n\
                        END:VCARD\n";
        assert_eq!(render_vcards(&records), expected);
    }

    #[test]
    fn test_render_empty_input() {
        assert_eq!(render_vcards(&[]), "");
    }

    #[test]
    fn test_render_keeps_duplicates() {
        let record = ContactRecord::new("Alice", "+15551234");
        let rendered = render_vcards(&[record.clone(), record]);
        assert_eq!(rendered.matches("BEGIN:VCARD").count(), 2);
    }

    #[test]
    fn test_export_filename_sanitizes_key() {
        assert_eq!(
            export_filename("telegram:12345"),
            "bulk_contacts_telegram_12345.vcf"
        );
        assert_eq!(export_filename("12345"), "bulk_contacts_12345.vcf");
    }
}
