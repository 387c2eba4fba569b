use super::support::sample_form;
use chrono::{TimeZone, Utc};
use clearance::domain::DEFAULT_CONTRIBUTION;
use clearance::{Certificate, IdentifierGenerator, Ndn, SubmissionRecord};

fn has_identifier_shape(identifier: &str, prefix: &str) -> bool {
    match identifier.split_once('-') {
        Some((p, digits)) => {
            p == prefix && digits.len() == 18 && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod identifier_tests {
    use super::*;

    #[test]
    fn test_generated_identifier_matches_shape() {
        let generator = IdentifierGenerator::default();

        for _ in 0..50 {
            let ndn = generator.generate();
            assert!(has_identifier_shape(ndn.as_str(), "PRJ"), "{ndn}");
            assert!(Ndn::parse(ndn.as_str()).is_ok());
        }
    }

    #[test]
    fn test_generated_identifier_embeds_current_time() {
        let before = Utc::now().timestamp_millis();
        let ndn = IdentifierGenerator::default().generate();
        let after = Utc::now().timestamp_millis();

        let millis: i64 = ndn.as_str()[4..17].parse().unwrap();
        assert!(millis >= before && millis <= after);
    }

    #[test]
    fn test_custom_prefix() {
        let generator = IdentifierGenerator::new("NDN").unwrap();
        let ndn = generator.generate();

        assert_eq!(ndn.prefix(), "NDN");
        assert!(has_identifier_shape(ndn.as_str(), "NDN"));
    }

    #[test]
    fn test_identifiers_apart_in_time_differ() {
        // Probabilistic: distinct milliseconds make a collision impossible here
        let generator = IdentifierGenerator::default();
        let first = generator.generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = generator.generate();

        assert_ne!(first, second);
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;

    #[test]
    fn test_record_from_form() {
        let ndn = Ndn::parse("PRJ-1700000000000075123").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();
        let record = SubmissionRecord::new(&ndn, &sample_form(), at);

        assert_eq!(record.identifier, "PRJ-1700000000000075123");
        assert_eq!(record.student_name, "A. Example");
        assert_eq!(record.contribution_amount, DEFAULT_CONTRIBUTION);
        assert!(record.rendered_image.is_none());
    }

    #[test]
    fn test_record_keeps_given_contribution() {
        let ndn = Ndn::parse("PRJ-1700000000000075123").unwrap();
        let mut form = sample_form();
        form.contribution = Some(" 25,000 NGN ".to_string());

        let record = SubmissionRecord::new(&ndn, &form, Utc::now());
        assert_eq!(record.contribution_amount, "25,000 NGN");
    }
}

#[cfg(test)]
mod certificate_tests {
    use super::*;

    #[test]
    fn test_certificate_from_record() {
        let ndn = Ndn::parse("PRJ-1700000000000075123").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();
        let record = SubmissionRecord::new(&ndn, &sample_form(), at);

        let certificate = Certificate::from_record(&record, "https://clearance.example");

        assert_eq!(certificate.submission_date, "2024-03-14 09:26:53");
        assert_eq!(
            certificate.verification_url,
            "https://clearance.example/verify?ndn=PRJ-1700000000000075123"
        );
        assert_eq!(certificate.qr.text, certificate.verification_url);
        assert_eq!(
            certificate.pdf.filename,
            "NERD_Clearance_A._Example_PRJ-1700000000000075123.pdf"
        );
        assert_eq!(certificate.pdf.margins_mm, [15, 15, 15, 15]);
        assert_eq!(certificate.display_identifier, "PRJ-1700000000000075123");
    }

    #[test]
    fn test_legacy_prefix_hidden_in_display() {
        let ndn = Ndn::parse("NDN-1700000000000075123").unwrap();
        let record = SubmissionRecord::new(&ndn, &sample_form(), Utc::now());

        let certificate = Certificate::from_record(&record, "http://localhost:8080");

        assert_eq!(certificate.display_identifier, "1700000000000075123");
        assert!(certificate.verification_url.ends_with("ndn=NDN-1700000000000075123"));
    }
}
