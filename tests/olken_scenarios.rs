use mrc::{Estimator, MissRateCurve, Olken};

#[test]
fn single_key_repeat() -> mrc::Result<()> {
    let mut olken = Olken::new(4, 1)?;

    for key in [7, 7, 7, 7] {
        olken.access(key)?;
    }
    olken.post_process()?;

    let hist = olken.histogram();
    assert_eq!(1, hist.infinity());
    assert_eq!([3, 0, 0, 0], *hist.bins());
    assert_eq!(4, hist.running_sum());
    assert!(hist.validate());

    let mrc = MissRateCurve::from_histogram(hist);
    assert_eq!([1.0, 0.25, 0.25, 0.25, 0.25], *mrc.miss_ratios());

    Ok(())
}

#[test]
fn two_alternating_keys() -> mrc::Result<()> {
    let mut olken = Olken::new(4, 1)?;

    for key in [1, 2, 1, 2, 1, 2] {
        olken.access(key)?;
    }

    let hist = olken.histogram();
    assert_eq!(2, hist.infinity());
    assert_eq!([0, 4, 0, 0], *hist.bins());
    assert_eq!(6, hist.running_sum());

    let mrc = MissRateCurve::from_histogram(hist);
    assert_eq!([1.0, 1.0, 2.0 / 6.0, 2.0 / 6.0, 2.0 / 6.0], *mrc.miss_ratios());

    Ok(())
}

#[test]
fn all_distinct_keys_always_miss() -> mrc::Result<()> {
    let mut olken = Olken::new(5, 1)?;

    for key in [1, 2, 3, 4, 5] {
        olken.access(key)?;
    }

    let hist = olken.histogram();
    assert_eq!(5, hist.infinity());
    assert!(hist.bins().iter().all(|&bin| bin == 0));
    assert_eq!(5, olken.tracked_len());

    let mrc = MissRateCurve::from_histogram(hist);
    assert!(mrc.miss_ratios().iter().all(|&ratio| ratio == 1.0));

    Ok(())
}

#[test]
fn distance_past_the_bins_is_false_infinity() -> mrc::Result<()> {
    let mut olken = Olken::new(2, 1)?;

    for key in [1, 2, 3, 4, 1] {
        olken.access(key)?;
    }

    let hist = olken.histogram();
    assert_eq!(4, hist.infinity());
    assert_eq!(1, hist.false_infinity());
    assert_eq!([0, 0], *hist.bins());

    let mrc = MissRateCurve::from_histogram(hist);
    assert!(mrc.miss_ratios().iter().all(|&ratio| ratio == 1.0));

    Ok(())
}

#[test]
fn mrc_is_weakly_decreasing() -> mrc::Result<()> {
    let mut olken = Olken::new(16, 2)?;

    for key in [1, 2, 3, 1, 4, 2, 5, 1, 2, 3, 4, 5, 1, 1] {
        olken.access(key)?;
    }

    let mrc = MissRateCurve::from_histogram(olken.histogram());
    let ratios = mrc.miss_ratios();

    assert_eq!(Some(&1.0), ratios.first());
    assert!(ratios.windows(2).all(|pair| pair[0] >= pair[1]));

    Ok(())
}
