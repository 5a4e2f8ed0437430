//! Stamping footprints into rasters and deriving rasters from footprints.
//!
//! All functions here work in the parent coordinate frame: a footprint span
//! at `(y, x0..x1)` touches the raster pixels at those parent positions,
//! wherever the raster's origin places it. Spans falling outside the raster
//! are clipped or skipped.

use astrodet_geom::Box2i;
use astrodet_image::Image;
use num_traits::PrimInt;

use crate::error::FootprintError;
use crate::footprint::Footprint;

/// Clamps a span to a raster row, returning local column bounds, or `None`
/// when the span misses the raster entirely.
fn clip_span_to<T>(image: &Image<T>, y: i32, x0: i32, x1: i32) -> Option<(usize, usize, usize)> {
    let row = y - image.y0();
    if row < 0 || row >= image.height() as i32 {
        return None;
    }
    let lx0 = (x0 - image.x0()).max(0);
    let lx1 = (x1 - image.x0()).min(image.width() as i32 - 1);
    if lx1 < lx0 {
        return None;
    }
    Some((row as usize, lx0 as usize, lx1 as usize))
}

/// ORs `bitmask` into every mask pixel under the footprint.
pub fn set_mask_from_footprint<T: PrimInt>(mask: &mut Image<T>, foot: &Footprint, bitmask: T) {
    for s in foot.spans() {
        if let Some((y, x0, x1)) = clip_span_to(mask, s.y, s.x0, s.x1) {
            for px in &mut mask.row_mut(y)[x0..=x1] {
                *px = *px | bitmask;
            }
        }
    }
}

/// ORs `bitmask` into the mask pixels under each footprint of the list.
pub fn set_mask_from_footprint_list<T: PrimInt>(
    mask: &mut Image<T>,
    foots: &[Footprint],
    bitmask: T,
) {
    for foot in foots {
        set_mask_from_footprint(mask, foot, bitmask);
    }
}

/// Clears `bitmask` from every mask pixel under the footprint.
pub fn clear_mask_from_footprint<T: PrimInt>(mask: &mut Image<T>, foot: &Footprint, bitmask: T) {
    for s in foot.spans() {
        if let Some((y, x0, x1)) = clip_span_to(mask, s.y, s.x0, s.x1) {
            for px in &mut mask.row_mut(y)[x0..=x1] {
                *px = *px & !bitmask;
            }
        }
    }
}

/// Writes `value` into every image pixel under the footprint.
pub fn set_image_from_footprint<T: Copy>(image: &mut Image<T>, foot: &Footprint, value: T) {
    for s in foot.spans() {
        if let Some((y, x0, x1)) = clip_span_to(image, s.y, s.x0, s.x1) {
            image.row_mut(y)[x0..=x1].fill(value);
        }
    }
}

/// Writes `value` into the image pixels under each footprint of the list.
pub fn set_image_from_footprint_list<T: Copy>(
    image: &mut Image<T>,
    foots: &[Footprint],
    value: T,
) {
    for foot in foots {
        set_image_from_footprint(image, foot, value);
    }
}

/// Copies the pixels under the footprint from `input` to `output`.
///
/// The two rasters may have different origins and sizes; only pixels covered
/// by both are copied.
pub fn copy_within_footprint<T: Copy>(foot: &Footprint, input: &Image<T>, output: &mut Image<T>) {
    for s in foot.spans() {
        let in_row = s.y - input.y0();
        let out_row = s.y - output.y0();
        if in_row < 0
            || in_row >= input.height() as i32
            || out_row < 0
            || out_row >= output.height() as i32
        {
            continue;
        }
        let x0 = s.x0.max(input.x0()).max(output.x0());
        let x1 = s
            .x1
            .min(input.x0() + input.width() as i32 - 1)
            .min(output.x0() + output.width() as i32 - 1);
        if x1 < x0 {
            continue;
        }
        let count = (x1 - x0 + 1) as usize;
        let in_off = (x0 - input.x0()) as usize;
        let out_off = (x0 - output.x0()) as usize;
        let src = input.row(in_row as usize);
        let dst = output.row_mut(out_row as usize);
        dst[out_off..out_off + count].copy_from_slice(&src[in_off..in_off + count]);
    }
}

/// Allocates an id image covering the footprint's region and stamps `id`
/// into the pixels under its spans. All other pixels are zero.
///
/// # Errors
///
/// Fails if `id` does not fit the pixel type.
pub fn footprint_id_image<T: PrimInt>(
    foot: &Footprint,
    id: u64,
) -> Result<Image<T>, FootprintError> {
    let mut image = Image::from_box_val(foot.region(), T::zero());
    foot.insert_into_image(&mut image, id, foot.region())?;
    Ok(image)
}

/// Allocates an id image covering `region` and stamps each footprint's id
/// into the pixels under its spans.
///
/// With `relative_ids` set, footprints are stamped with their one-based
/// position in the list instead of their global id, keeping the pixel values
/// small enough for narrow pixel types.
///
/// # Errors
///
/// Fails if any id does not fit the pixel type.
pub fn footprint_array_id_image<T: PrimInt>(
    foots: &[Footprint],
    region: &Box2i,
    relative_ids: bool,
) -> Result<Image<T>, FootprintError> {
    let mut image = Image::from_box_val(region, T::zero());
    for (index, foot) in foots.iter().enumerate() {
        let id = if relative_ids {
            index as u64 + 1
        } else {
            foot.id()
        };
        foot.insert_into_image(&mut image, id, region)?;
    }
    Ok(image)
}

const NIL: u16 = 0xffff;

/// Labels every pixel of `argmin` with the index of the nearest footprint and
/// every pixel of `dist` with the city-block distance to it.
///
/// Both rasters must be the same size. Runs a two-pass chamfer transform:
/// pixels inside a footprint get distance 0, every other pixel the number of
/// city-block steps to the closest footprint pixel. Pixels of `argmin` keep
/// the `0xffff` sentinel only when `foots` is empty.
pub fn nearest_footprint(foots: &[Footprint], argmin: &mut Image<u16>, dist: &mut Image<u16>) {
    debug_assert_eq!(argmin.size(), dist.size());
    let width = argmin.width();
    let height = argmin.height();
    let far = (width + height).min(u16::MAX as usize) as u16;

    argmin.fill(NIL);
    dist.fill(far);
    for (index, foot) in foots.iter().enumerate() {
        for s in foot.spans() {
            if let Some((y, x0, x1)) = clip_span_to(argmin, s.y, s.x0, s.x1) {
                argmin.row_mut(y)[x0..=x1].fill(index as u16);
                dist.row_mut(y)[x0..=x1].fill(0);
            }
        }
    }

    // forward pass: propagate from the north and west neighbors
    for y in 0..height {
        for x in 0..width {
            let mut best = *dist.pixel(x, y);
            let mut label = *argmin.pixel(x, y);
            if y > 0 && dist.pixel(x, y - 1).saturating_add(1) < best {
                best = dist.pixel(x, y - 1) + 1;
                label = *argmin.pixel(x, y - 1);
            }
            if x > 0 && dist.pixel(x - 1, y).saturating_add(1) < best {
                best = dist.pixel(x - 1, y) + 1;
                label = *argmin.pixel(x - 1, y);
            }
            *dist.pixel_mut(x, y) = best;
            *argmin.pixel_mut(x, y) = label;
        }
    }
    // backward pass: propagate from the south and east neighbors
    for y in (0..height).rev() {
        for x in (0..width).rev() {
            let mut best = *dist.pixel(x, y);
            let mut label = *argmin.pixel(x, y);
            if y + 1 < height && dist.pixel(x, y + 1).saturating_add(1) < best {
                best = dist.pixel(x, y + 1) + 1;
                label = *argmin.pixel(x, y + 1);
            }
            if x + 1 < width && dist.pixel(x + 1, y).saturating_add(1) < best {
                best = dist.pixel(x + 1, y) + 1;
                label = *argmin.pixel(x + 1, y);
            }
            *dist.pixel_mut(x, y) = best;
            *argmin.pixel_mut(x, y) = label;
        }
    }
}

/// Decomposes a footprint into a minimal-ish list of disjoint boxes that
/// exactly cover its pixels.
///
/// Greedy maximal rectangles: the footprint is stamped into a scratch
/// raster, then each remaining run seeds a box that is grown upward row by
/// row while the rows stay fully covered. Covered pixels are cleared as they
/// are claimed, so the returned boxes are disjoint and their total area is
/// the footprint area.
pub fn footprint_to_bbox_list(foot: &Footprint) -> Vec<Box2i> {
    let bbox = *foot.bbox();
    if bbox.is_empty() {
        return Vec::new();
    }
    let mut scratch = Image::<u16>::from_box_val(&bbox, 0);
    set_mask_from_footprint(&mut scratch, foot, 1);
    let width = scratch.width();
    let height = scratch.height();

    let mut boxes = Vec::new();
    for y in 0..height {
        let mut x = 0;
        while x < width {
            if *scratch.pixel(x, y) == 0 {
                x += 1;
                continue;
            }
            // found the left edge of a run
            let x0 = x;
            while x < width && *scratch.pixel(x, y) != 0 {
                x += 1;
            }
            let x1 = x - 1;
            scratch.row_mut(y)[x0..=x1].fill(0);

            // grow upward while the rows above are fully covered
            let mut y1 = y;
            while y1 + 1 < height {
                let row_above = scratch.row(y1 + 1);
                if row_above[x0..=x1].iter().any(|&p| p == 0) {
                    break;
                }
                y1 += 1;
                scratch.row_mut(y1)[x0..=x1].fill(0);
            }

            boxes.push(Box2i::from_corners(
                astrodet_geom::Point2i::new(bbox.min_x() + x0 as i32, bbox.min_y() + y as i32),
                astrodet_geom::Point2i::new(bbox.min_x() + x1 as i32, bbox.min_y() + y1 as i32),
            ));
        }
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use astrodet_geom::Point2i;
    use astrodet_image::{ImageSize, Mask};

    fn region() -> Box2i {
        Box2i::from_corners(Point2i::new(0, 0), Point2i::new(30, 30))
    }

    #[test]
    fn set_and_clear_mask_round_trip() {
        let foot = Footprint::from_circle(Point2i::new(5, 5), 2.0, region());
        let mut mask = Mask::from_size_val(
            ImageSize {
                width: 12,
                height: 12,
            },
            0,
        );
        set_mask_from_footprint(&mut mask, &foot, 0x10);
        let set = mask.as_slice().iter().filter(|&&p| p == 0x10).count();
        assert_eq!(set as u64, foot.area());
        assert_eq!(*mask.pixel(5, 5), 0x10);

        clear_mask_from_footprint(&mut mask, &foot, 0x10);
        assert!(mask.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn stamping_respects_raster_origin() {
        let mut foot = Footprint::new(0, region());
        foot.add_span(20, 8, 12);
        let mut mask = Mask::from_size_val(
            ImageSize {
                width: 4,
                height: 2,
            },
            0,
        )
        .with_origin(10, 20);
        set_mask_from_footprint(&mut mask, &foot, 1);
        // columns 8..=9 fall left of the raster, 10..=12 inside but clipped
        // to its width of 4
        assert_eq!(mask.row(0), &[1, 1, 1, 0]);
        assert_eq!(mask.row(1), &[0, 0, 0, 0]);
    }

    #[test]
    fn set_image_writes_value_under_spans() {
        let bbox = Box2i::from_corners(Point2i::new(1, 1), Point2i::new(3, 2));
        let foot = Footprint::from_bbox(&bbox, region());
        let mut img = Image::<f32>::from_size_val(
            ImageSize {
                width: 5,
                height: 4,
            },
            0.0,
        );
        set_image_from_footprint(&mut img, &foot, 2.5);
        assert_eq!(*img.pixel(1, 1), 2.5);
        assert_eq!(*img.pixel(3, 2), 2.5);
        assert_eq!(*img.pixel(0, 0), 0.0);
        assert_eq!(*img.pixel(4, 3), 0.0);
    }

    #[test]
    fn copy_within_footprint_moves_only_covered_pixels() {
        let bbox = Box2i::from_corners(Point2i::new(1, 1), Point2i::new(2, 2));
        let foot = Footprint::from_bbox(&bbox, region());
        let size = ImageSize {
            width: 4,
            height: 4,
        };
        let mut input = Image::<i32>::from_size_val(size, 7);
        *input.pixel_mut(1, 1) = 9;
        let mut output = Image::<i32>::from_size_val(size, 0);
        copy_within_footprint(&foot, &input, &mut output);
        assert_eq!(*output.pixel(1, 1), 9);
        assert_eq!(*output.pixel(2, 2), 7);
        assert_eq!(*output.pixel(0, 0), 0);
        assert_eq!(*output.pixel(3, 3), 0);
    }

    #[test]
    fn nearest_footprint_labels_by_proximity() {
        let size = ImageSize {
            width: 16,
            height: 8,
        };
        let mut a = Footprint::new(0, region());
        a.add_span(3, 1, 2);
        let mut b = Footprint::new(0, region());
        b.add_span(3, 12, 13);
        let foots = vec![a, b];

        let mut argmin = Image::<u16>::from_size_val(size, 0);
        let mut dist = Image::<u16>::from_size_val(size, 0);
        nearest_footprint(&foots, &mut argmin, &mut dist);

        assert_eq!(*argmin.pixel(1, 3), 0);
        assert_eq!(*dist.pixel(1, 3), 0);
        assert_eq!(*argmin.pixel(0, 0), 0);
        assert_eq!(*argmin.pixel(15, 7), 1);
        // distance grows city-block style away from the footprint
        assert_eq!(*dist.pixel(1, 5), 2);
    }

    #[test]
    fn distance_is_zero_inside_and_counts_steps_outside() {
        let size = ImageSize {
            width: 8,
            height: 8,
        };
        let mut foot = Footprint::new(1, region());
        foot.add_span(3, 3, 3);
        let foots = vec![foot];

        let mut argmin = Image::<u16>::from_size_val(size, 0);
        let mut dist = Image::<u16>::from_size_val(size, 0);
        nearest_footprint(&foots, &mut argmin, &mut dist);

        assert_eq!(*dist.pixel(3, 3), 0);
        assert_eq!(*dist.pixel(4, 3), 1);
        assert_eq!(*dist.pixel(3, 5), 2);
        assert_eq!(*dist.pixel(0, 0), 6);
        assert!(argmin.as_slice().iter().all(|&label| label == 0));
    }

    #[test]
    fn id_image_stamps_id_under_spans_only() {
        let small = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(7, 7));
        let bbox = Box2i::from_corners(Point2i::new(2, 2), Point2i::new(4, 3));
        let foot = Footprint::from_bbox(&bbox, small);
        let image: Image<u16> = footprint_id_image(&foot, 9).unwrap();
        assert_eq!(image.bbox(), small);
        assert_eq!(*image.pixel(2, 2), 9);
        assert_eq!(*image.pixel(4, 3), 9);
        assert_eq!(*image.pixel(0, 0), 0);
        assert_eq!(*image.pixel(5, 3), 0);
    }

    #[test]
    fn array_id_image_uses_one_based_relative_ids() {
        let small = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(7, 7));
        let a = Footprint::from_bbox(
            &Box2i::from_corners(Point2i::new(0, 0), Point2i::new(1, 1)),
            small,
        );
        let b = Footprint::from_bbox(
            &Box2i::from_corners(Point2i::new(5, 5), Point2i::new(6, 6)),
            small,
        );
        let foots = vec![a, b];

        let relative: Image<u8> = footprint_array_id_image(&foots, &small, true).unwrap();
        assert_eq!(*relative.pixel(0, 0), 1);
        assert_eq!(*relative.pixel(5, 5), 2);
        assert_eq!(*relative.pixel(3, 3), 0);

        // global ids exceed u8 after enough footprints have been created
        let global: Image<u64> = footprint_array_id_image(&foots, &small, false).unwrap();
        assert_eq!(*global.pixel(0, 0), foots[0].id());
        assert_eq!(*global.pixel(5, 5), foots[1].id());
    }

    #[test]
    fn bbox_list_covers_footprint_exactly() {
        let mut foot = Footprint::new(0, region());
        // a plus sign
        foot.add_span(0, 2, 4);
        foot.add_span(1, 0, 6);
        foot.add_span(2, 2, 4);
        foot.normalize();

        let boxes = footprint_to_bbox_list(&foot);
        let total: i64 = boxes.iter().map(|b| b.area()).sum();
        assert_eq!(total as u64, foot.area());
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                let mut clipped = *a;
                clipped.clip(b);
                assert!(clipped.is_empty(), "boxes overlap");
            }
        }
        for s in foot.spans() {
            for x in s.x0..=s.x1 {
                let p = Point2i::new(x, s.y);
                assert!(boxes.iter().any(|b| b.contains(p)));
            }
        }
    }

    #[test]
    fn bbox_list_of_rectangle_is_one_box() {
        let bbox = Box2i::from_corners(Point2i::new(3, 4), Point2i::new(7, 9));
        let foot = Footprint::from_bbox(&bbox, region());
        let boxes = footprint_to_bbox_list(&foot);
        assert_eq!(boxes, vec![bbox]);
    }
}
