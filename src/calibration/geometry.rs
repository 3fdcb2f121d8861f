/// Rectangle primitives shared by the classifiers and the transform engine.
use crate::calibration::types::BoundingBox;

/// Swap each coordinate pair into ascending order.
pub fn order_rectangle(r: &BoundingBox) -> BoundingBox {
    BoundingBox {
        xmin: r.xmin.min(r.xmax),
        xmax: r.xmin.max(r.xmax),
        ymin: r.ymin.min(r.ymax),
        ymax: r.ymin.max(r.ymax),
    }
}

/// Clamp every coordinate into `[0, frame_max]`. NaN coordinates collapse
/// to 0; a negative or NaN bound is treated as 0.
pub fn clamp_to_frame(r: &BoundingBox, frame_max: f64) -> BoundingBox {
    let bound = frame_max.max(0.0);
    let clamp = |v: f64| {
        if v.is_nan() {
            0.0
        } else {
            v.clamp(0.0, bound)
        }
    };
    BoundingBox {
        xmin: clamp(r.xmin),
        xmax: clamp(r.xmax),
        ymin: clamp(r.ymin),
        ymax: clamp(r.ymax),
    }
}

/// Minimal rectangle enclosing every (ordered) rectangle in the batch.
pub fn extents(rects: &[BoundingBox]) -> Option<BoundingBox> {
    let mut iter = rects.iter().map(order_rectangle);
    let first = iter.next()?;
    Some(iter.fold(first, |acc, r| BoundingBox {
        xmin: acc.xmin.min(r.xmin),
        xmax: acc.xmax.max(r.xmax),
        ymin: acc.ymin.min(r.ymin),
        ymax: acc.ymax.max(r.ymax),
    }))
}

/// Smallest and largest coordinate over every value in the batch.
pub(crate) fn value_range(rects: &[BoundingBox]) -> Option<(f64, f64)> {
    rects
        .iter()
        .flat_map(|r| r.coords())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<BoundingBox> {
        vec![
            BoundingBox::new(600.0, 10.0, 400.0, 90.0),
            BoundingBox::new(-5.0, 1200.0, 30.0, -40.0),
            BoundingBox::new(1.0, 1.0, 1.0, 1.0),
            BoundingBox::new(0.25, 0.75, 0.5, 0.125),
        ]
    }

    #[test]
    fn ordering_is_ascending_and_idempotent() {
        for r in samples() {
            let once = order_rectangle(&r);
            assert!(once.xmin <= once.xmax);
            assert!(once.ymin <= once.ymax);
            assert_eq!(order_rectangle(&once), once);
        }
    }

    #[test]
    fn inverted_rectangle_is_reordered_not_rejected() {
        let r = order_rectangle(&BoundingBox::new(600.0, 100.0, 400.0, 200.0));
        assert_eq!(r.xmin, 400.0);
        assert_eq!(r.xmax, 600.0);
    }

    #[test]
    fn clamping_keeps_all_coordinates_in_bounds() {
        for bound in [1.0, 100.0, 1000.0] {
            for r in samples() {
                let c = clamp_to_frame(&r, bound);
                for v in c.coords() {
                    assert!((0.0..=bound).contains(&v), "{v} outside [0, {bound}]");
                }
            }
        }
        let nan = clamp_to_frame(&BoundingBox::new(f64::NAN, 5.0, 5.0, 5.0), 10.0);
        assert_eq!(nan.xmin, 0.0);
    }

    #[test]
    fn unusable_bound_collapses_to_origin() {
        let r = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        for bound in [-1.0, f64::NAN] {
            assert_eq!(clamp_to_frame(&r, bound), BoundingBox::new(0.0, 0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn extents_enclose_the_batch() {
        let boxes = vec![
            BoundingBox::new(100.0, 250.0, 300.0, 262.0),
            BoundingBox::new(500.0, 750.0, 700.0, 738.0),
        ];
        let e = extents(&boxes).unwrap();
        assert_eq!(e, BoundingBox::new(100.0, 250.0, 700.0, 750.0));
        assert!(extents(&[]).is_none());
    }

    #[test]
    fn degenerate_rectangle_is_legal() {
        let r = order_rectangle(&BoundingBox::new(5.0, 5.0, 5.0, 9.0));
        assert_eq!(r.width(), 0.0);
        assert_eq!(r.height(), 4.0);
    }
}
