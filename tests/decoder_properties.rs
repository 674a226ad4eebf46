mod common;

use chrono::{Days, Duration, NaiveDate, TimeZone, Utc};
use common::register_line;
use sks_import::{decode_line, parse_register_date, start_of_day, Decoded, InstitutionType, SkipReason};

#[test]
fn every_operation_code_outside_create_update_blank_is_fatal() {
    for byte in 0x21u8..0x7f {
        let code = byte as char;
        let line = register_line("afd", "1301011", "20040101", "25000101", "Klinik", Some(code));
        let decoded = decode_line(&line, 1);

        match code {
            '1' | '3' => assert!(matches!(decoded, Ok(Decoded::Record(_))), "code {:?}", code),
            _ => assert!(decoded.unwrap_err().is_malformed_record(), "code {:?}", code),
        }
    }

    let blank = register_line("afd", "1301011", "20040101", "25000101", "Klinik", Some(' '));
    assert_eq!(decode_line(&blank, 1).unwrap(), Decoded::Skip(SkipReason::NoOperation));
}

#[test]
fn every_line_shorter_than_the_operation_column_is_skipped() {
    let full = register_line("sgh", "1301", "19760401", "25000101", "Rigshospitalet", Some('1'));

    for len in 3..full.len() {
        assert_eq!(
            decode_line(&full[..len], 1).unwrap(),
            Decoded::Skip(SkipReason::LegacyLayout),
            "length {}",
            len
        );
    }
}

#[test]
fn kind_follows_tag_and_valid_to_is_one_day_after_raw_end() {
    let cases = [
        ("sgh", InstitutionType::Hospital, "19760401", "25000101"),
        ("afd", InstitutionType::HospitalDepartment, "19950101", "19991231"),
        ("afd", InstitutionType::HospitalDepartment, "20000101", "20000228"),
        ("sgh", InstitutionType::Hospital, "20040101", "20040229"),
    ];

    for (tag, kind, from, to) in cases {
        for code in ['1', '3'] {
            let line = register_line(tag, "4711", from, to, "Navn", Some(code));
            let record = decode_line(&line, 1).unwrap().into_record().unwrap();

            let raw_end: NaiveDate = parse_register_date(to).unwrap();
            assert_eq!(record.kind(), kind);
            assert_eq!(record.valid_from(), start_of_day(parse_register_date(from).unwrap()));
            assert_eq!(record.valid_to(), start_of_day(raw_end.checked_add_days(Days::new(1)).unwrap()));
        }
    }
}

#[test]
fn year_9999_end_dates_decode_within_storable_range() {
    let day_before = register_line("sgh", "1301", "19760401", "99991230", "Rigshospitalet", Some('1'));
    let record = decode_line(&day_before, 1).unwrap().into_record().unwrap();
    assert_eq!(record.valid_to(), Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap());

    let last_day = register_line("sgh", "1301", "19760401", "99991231", "Rigshospitalet", Some('3'));
    let record = decode_line(&last_day, 1).unwrap().into_record().unwrap();
    let next_midnight = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(record.valid_to(), next_midnight - Duration::microseconds(1));
    assert!(record.valid_from() < record.valid_to());

    let starts_on_last_day = register_line("afd", "1301011", "99991231", "99991231", "Klinik", Some('1'));
    let record = decode_line(&starts_on_last_day, 1).unwrap().into_record().unwrap();
    assert!(record.valid_from() < record.valid_to());
}

#[test]
fn unknown_tags_fail_whatever_the_operation_code() {
    for tag in ["kom", "AFD", "sg ", "   "] {
        for code in [Some('1'), Some('3'), Some(' '), Some('2'), None] {
            let line = register_line(tag, "1", "20000101", "25000101", "X", code);
            assert!(decode_line(&line, 1).unwrap_err().is_malformed_record(), "tag {:?}", tag);
        }
    }
}
