use dirfile_core::{
    Dirfile, DirfileError, ErrorClass, IoDirection, MplexLookback, OpenOptions, RenamePolicy,
    SampleRange, SeekOrigin,
    entry::{Entry, EntryKind},
    error::Guarded,
    fragment::{IncludeOptions, Protection},
    take_process_error_count,
    types::ElementType,
    wire,
};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A dirfile holding INT8 field `data` with 8 samples per frame and values 1..=80.
fn int8_dirfile() -> Result<(TempDir, Dirfile), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
    dirfile.add(Entry::raw("data", ElementType::Int8, 8)?)?;
    let values: Vec<i8> = (1..=80).collect();
    assert_eq!(dirfile.put_data("data", SampleRange::frames(0, 10), &values)?, 80);
    Ok((tmp, dirfile))
}

#[test]
fn partial_frame_writes_keep_their_neighbours() -> TestResult {
    let (_tmp, mut dirfile) = int8_dirfile()?;
    let frame5 = dirfile.get_data::<i8>("data", SampleRange::new(5, 0, 1, 0))?;
    assert_eq!(frame5, vec![41, 42, 43, 44, 45, 46, 47, 48]);

    let written = dirfile.put_data("data", SampleRange::new(5, 1, 0, 4), &[13i8, 14, 15, 16])?;
    assert_eq!(written, 4);
    let frame5 = dirfile.get_data::<i8>("data", SampleRange::frames(5, 1))?;
    assert_eq!(frame5, vec![41, 13, 14, 15, 16, 46, 47, 48]);
    Ok(())
}

#[test]
fn lincom_identity_matches_the_input() -> TestResult {
    let (_tmp, mut dirfile) = int8_dirfile()?;
    dirfile.add(Entry::lincom("same", &["data"], vec![1.0.into()], vec![0.0.into()])?)?;
    let raw = dirfile.get_data::<f64>("data", SampleRange::frames(0, 10))?;
    let derived = dirfile.get_data::<f64>("same", SampleRange::frames(0, 10))?;
    assert_eq!(raw, derived);
    Ok(())
}

#[test]
fn bit_fields_extract_and_sign_extend() -> TestResult {
    let tmp = TempDir::new()?;
    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
    dirfile.add(Entry::raw("word", ElementType::Uint8, 1)?)?;
    dirfile.add(Entry::bit("mid", "word", 2, 3)?)?;
    dirfile.add(Entry::sbit("smid", "word", 2, 3)?)?;
    dirfile.put_data("word", SampleRange::samples(0, 1), &[0b1011_0100u8])?;

    assert_eq!(dirfile.get_data::<u8>("mid", SampleRange::samples(0, 1))?, vec![0b101]);
    assert_eq!(dirfile.get_data::<i8>("smid", SampleRange::samples(0, 1))?, vec![-3]);
    assert!(Entry::bit("bad", "word", 0, 0).is_err());

    dirfile.put_data("mid", SampleRange::samples(0, 1), &[0u8])?;
    assert_eq!(dirfile.get_data::<u8>("word", SampleRange::samples(0, 1))?, vec![0b1010_0000]);
    Ok(())
}

#[test]
fn cycles_fail_instead_of_recursing() -> TestResult {
    let tmp = TempDir::new()?;
    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
    dirfile.add(Entry::phase("a", "b", 0)?)?;
    let err = dirfile.add(Entry::phase("b", "a", 0)?);
    assert!(matches!(err, Err(DirfileError::Cycle { .. })));

    // a rename can still close a loop; reads catch it
    dirfile.add(Entry::phase("c", "a", 0)?)?;
    dirfile.rename("c", "b", RenamePolicy::Fail)?;
    let err = dirfile.get_data::<f64>("a", SampleRange::samples(0, 1));
    let err = err.err().ok_or("cyclic read succeeded")?;
    assert_eq!(err.class(), ErrorClass::Graph);
    Ok(())
}

#[test]
fn format_protection_leaves_the_fragment_unchanged() -> TestResult {
    let (_tmp, mut dirfile) = int8_dirfile()?;
    dirfile.alter_protection(0, Protection::Format)?;
    let err = dirfile.alter_frame_offset(0, 4, false);
    assert!(matches!(err, Err(DirfileError::Protected { guard: Guarded::Format, .. })));
    assert_eq!(dirfile.fragment(0)?.frame_offset(), 0);

    dirfile.alter_protection(0, Protection::Data)?;
    let err = dirfile.put_data("data", SampleRange::samples(0, 1), &[0i8]);
    assert!(matches!(err, Err(DirfileError::Protected { guard: Guarded::Data, .. })));
    assert_eq!(dirfile.get_data::<i8>("data", SampleRange::samples(0, 1))?, vec![1]);
    Ok(())
}

#[test]
fn multiplex_holds_the_last_match() -> TestResult {
    let tmp = TempDir::new()?;
    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
    dirfile.add(Entry::raw("d", ElementType::Int32, 1)?)?;
    dirfile.add(Entry::raw("sel", ElementType::Uint8, 1)?)?;
    dirfile.add(Entry::mplex("m", "d", "sel", 1, 10)?)?;
    let data: Vec<i32> = (100..120).collect();
    let selector: Vec<u8> = (0..20).map(|i| if i % 2 == 0 { 1 } else { 2 }).collect();
    dirfile.put_data("d", SampleRange::samples(0, 20), &data)?;
    dirfile.put_data("sel", SampleRange::samples(0, 20), &selector)?;

    assert_eq!(dirfile.get_data::<i32>("m", SampleRange::samples(5, 3))?, vec![104, 106, 106]);
    dirfile.set_mplex_lookback(MplexLookback::Cycles(0));
    assert_eq!(dirfile.get_data::<i32>("m", SampleRange::samples(5, 3))?, vec![0, 106, 106]);
    dirfile.set_mplex_lookback(MplexLookback::All);
    assert_eq!(dirfile.get_data::<i32>("m", SampleRange::samples(19, 1))?, vec![118]);
    Ok(())
}

#[test]
fn seek_then_read_here_advances_the_cursor() -> TestResult {
    let (_tmp, mut dirfile) = int8_dirfile()?;
    assert_eq!(dirfile.seek("data", 7, 0, SeekOrigin::Set, IoDirection::Read)?, 56);
    let frame = dirfile.get_data::<i8>("data", SampleRange::here(1, 0))?;
    assert_eq!(frame.len(), 8);
    assert_eq!(dirfile.tell("data")?, 64);
    Ok(())
}

#[test]
fn frame_offsets_shift_bof_and_framenum() -> TestResult {
    let (_tmp, mut dirfile) = int8_dirfile()?;
    dirfile.alter_frame_offset(0, 33, false)?;
    assert_eq!(dirfile.bof("data")?, 264);
    assert_eq!(dirfile.eof("data")?, 344);
    assert_eq!(dirfile.framenum("data", 52.5)?, 39.4375);
    assert_eq!(dirfile.get_data::<i8>("data", SampleRange::new(32, 6, 0, 4))?, vec![0, 0, 1, 2]);
    Ok(())
}

#[test]
fn include_and_uninclude_round_trip() -> TestResult {
    let tmp = TempDir::new()?;
    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
    let sub = dirfile.include("sensors", 0, IncludeOptions::create().namespace("hk"))?;
    dirfile.add(Entry::raw("temp", ElementType::Float32, 1)?.in_fragment(sub))?;
    dirfile.put_data("hk.temp", SampleRange::samples(0, 2), &[1.5f32, 2.5])?;
    dirfile.close()?;

    let reopened = Dirfile::open(tmp.path(), OpenOptions::new())?;
    assert_eq!(reopened.fragment_count(), 2);
    assert_eq!(reopened.entry("hk.temp")?.fragment, 1);
    assert_eq!(reopened.get_data::<f32>("hk.temp", SampleRange::samples(0, 2))?, vec![1.5, 2.5]);
    reopened.discard()?;

    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().write(true))?;
    dirfile.uninclude(1, true)?;
    assert!(dirfile.entry("hk.temp").is_err());
    assert!(!tmp.path().join("sensors").exists());
    dirfile.close()?;
    Ok(())
}

#[test]
fn rename_policies_are_distinct_behaviours() -> TestResult {
    let (_tmp, mut dirfile) = int8_dirfile()?;
    dirfile.add(Entry::bit("flag", "data", 0, 1)?)?;

    let err = dirfile.rename("data", "counts", RenamePolicy::Fail);
    assert!(matches!(err, Err(DirfileError::Referenced { .. })));
    assert!(dirfile.entry("data").is_ok());

    dirfile.rename("data", "counts", RenamePolicy::UpdateReferences)?;
    assert_eq!(dirfile.entry("flag")?.inputs(), vec!["counts"]);

    dirfile.rename("counts", "data2", RenamePolicy::Force)?;
    assert_eq!(dirfile.entry("flag")?.inputs(), vec!["counts"]);
    assert!(dirfile.get_data::<u8>("flag", SampleRange::samples(0, 1)).is_err());
    Ok(())
}

#[test]
fn records_decode_into_entries() -> TestResult {
    let tmp = TempDir::new()?;
    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
    let record = wire::encode(&Entry::polynom(
        "cal",
        "INDEX",
        1,
        vec![1.0.into(), 2.0.into()],
    )?)?;
    assert_eq!(wire::decode(&record)?, wire::decode(&record)?);
    let name = dirfile.add_record(&record)?;
    assert_eq!(name, "cal");
    assert_eq!(dirfile.entry_kind("cal")?, EntryKind::Polynom);
    assert_eq!(dirfile.get_data::<f64>("cal", SampleRange::samples(3, 2))?, vec![7.0, 9.0]);

    let mut bad = record.clone();
    bad[..4].copy_from_slice(&u32::MAX.to_ne_bytes());
    assert!(matches!(dirfile.add_record(&bad), Err(DirfileError::Wire { .. })));
    Ok(())
}

#[test]
fn read_only_handles_refuse_writes_and_count_errors() -> TestResult {
    let (tmp, dirfile) = int8_dirfile()?;
    dirfile.close()?;
    let _ = take_process_error_count();

    let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new())?;
    assert!(matches!(
        dirfile.put_data("data", SampleRange::samples(0, 1), &[0i8]),
        Err(DirfileError::ReadOnly)
    ));
    assert!(dirfile.entry("nope").is_err());
    assert_eq!(dirfile.error_count(), 2);
    assert_eq!(dirfile.error_count(), 0);
    assert!(dirfile.last_error().is_some_and(|m| m.contains("nope")));
    assert!(take_process_error_count() >= 2);
    Ok(())
}
