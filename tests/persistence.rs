use byteorder::{NativeEndian, ReadBytesExt};
use mrc::{Estimator, Histogram, MissRateCurve, Olken, TraceRunner};
use std::io::Read;

#[test]
fn sparse_save_writes_nonzero_bins_only() -> mrc::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("olken.hist");

    let mut hist = Histogram::new(8, 1)?;
    hist.insert_finite(0);
    hist.insert_finite(0);
    hist.insert_finite(3);

    hist.save_sparse(&path)?;

    let mut file = std::fs::File::open(&path)?;
    let mut pairs = vec![];
    loop {
        let Ok(scaled_index) = file.read_u64::<NativeEndian>() else {
            break;
        };
        let frequency = file.read_u64::<NativeEndian>()?;
        pairs.push((scaled_index, frequency));
    }

    assert_eq!(vec![(0, 2), (3, 1)], pairs);

    Ok(())
}

#[test]
fn sparse_save_respects_bin_size() -> mrc::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("scaled.hist");

    let mut hist = Histogram::new(4, 10)?;
    hist.insert_finite(25); // bin 2
    hist.save_sparse(&path)?;

    let mut file = std::fs::File::open(&path)?;
    let scaled_index = file.read_u64::<NativeEndian>()?;
    let frequency = file.read_u64::<NativeEndian>()?;

    // indexes are written rescaled by the bin size
    assert_eq!((20, 1), (scaled_index, frequency));

    Ok(())
}

#[test]
fn mrc_save_is_packed_f64() -> mrc::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("olken.mrc");

    let mut olken = Olken::new(4, 1)?;
    for key in [7, 7, 7, 7] {
        olken.access(key)?;
    }

    let mrc = MissRateCurve::from_histogram(olken.histogram());
    mrc.save(&path)?;

    let mut file = std::fs::File::open(&path)?;
    let mut ratios = vec![];
    loop {
        let Ok(ratio) = file.read_f64::<NativeEndian>() else {
            break;
        };
        ratios.push(ratio);
    }

    assert_eq!(vec![1.0, 0.25, 0.25, 0.25, 0.25], ratios);

    Ok(())
}

#[test]
fn histogram_json_dump_is_sparse() -> mrc::Result<()> {
    let mut hist = Histogram::new(4, 1)?;
    hist.insert_finite(1);
    hist.insert_infinite();

    let mut out = vec![];
    hist.write_json(&mut out)?;
    let json = String::from_utf8(out).expect("json dump should be utf-8");

    assert!(json.contains("\"type\": \"Histogram\""));
    assert!(json.contains("\"1\": 1"));
    assert!(!json.contains("\"0\":"));
    assert!(json.contains("\"infinity\": 1"));

    Ok(())
}

#[test]
fn runner_persists_artifacts() -> mrc::Result<()> {
    let folder = tempfile::tempdir()?;
    let hist_path = folder.path().join("run.hist");
    let mrc_path = folder.path().join("run.mrc");

    let mut olken = Olken::new(4, 1)?;

    let mrc = TraceRunner::new()
        .histogram_path(&hist_path)
        .mrc_path(&mrc_path)
        .run(&mut olken, [1, 2, 1, 2])?;

    assert_eq!(Some(&1.0), mrc.miss_ratios().first());

    // both artifacts land on disk
    let mut hist_bytes = vec![];
    std::fs::File::open(&hist_path)?.read_to_end(&mut hist_bytes)?;
    assert_eq!(16, hist_bytes.len()); // one nonzero bin

    let mrc_bytes = std::fs::read(&mrc_path)?;
    assert_eq!(5 * 8, mrc_bytes.len());

    Ok(())
}
