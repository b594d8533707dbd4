//! Face alignment via a 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the InsightFace reference positions
//! and warps the face into a canonical 112×112 crop.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Least-squares similarity transform (scale, rotation, translation) from
/// `src` to `dst`, as a row-major 3×3 matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// | 0   0   1 |
/// ```
/// `None` when the source points are degenerate (all coincident).
fn similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Option<[f32; 9]> {
    let mean = |pts: &[(f32, f32); 5]| {
        let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
        (sx / 5.0, sy / 5.0)
    };
    let (smx, smy) = mean(src);
    let (dmx, dmy) = mean(dst);

    let (mut num_a, mut num_b, mut denom) = (0.0f32, 0.0f32, 0.0f32);
    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy, dx, dy) = (sx - smx, sy - smy, dx - dmx, dy - dmy);
        num_a += sx * dx + sy * dy;
        num_b += sx * dy - sy * dx;
        denom += sx * sx + sy * sy;
    }
    if denom < 1e-6 {
        return None;
    }

    let a = num_a / denom;
    let b = num_b / denom;
    let tx = dmx - (a * smx - b * smy);
    let ty = dmy - (b * smx + a * smy);
    Some([a, -b, tx, b, a, ty, 0.0, 0.0, 1.0])
}

/// Warp the face described by `landmarks` into a 112×112 crop.
///
/// Pixels outside the source frame come out black. `None` if the landmarks
/// do not define a usable transform.
pub fn align_face(frame: &RgbImage, landmarks: &[(f32, f32); 5]) -> Option<RgbImage> {
    let matrix = similarity_transform(landmarks, &REFERENCE_LANDMARKS_112)?;
    let projection = Projection::from_matrix(matrix)?;
    let mut out = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
    warp_into(frame, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut out);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let m = similarity_transform(&REFERENCE_LANDMARKS_112, &REFERENCE_LANDMARKS_112).unwrap();
        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4, "-b = {}", m[1]);
        assert!(m[2].abs() < 1e-3, "tx = {}", m[2]);
        assert!(m[5].abs() < 1e-3, "ty = {}", m[5]);
    }

    #[test]
    fn test_scaled_transform() {
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (x * 2.0, y * 2.0));
        let m = similarity_transform(&src, &REFERENCE_LANDMARKS_112).unwrap();
        assert!((m[0] - 0.5).abs() < 1e-3, "a = {}, expected 0.5", m[0]);
        assert!(m[3].abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_landmarks() {
        let src = [(10.0, 10.0); 5];
        assert!(similarity_transform(&src, &REFERENCE_LANDMARKS_112).is_none());
        assert!(align_face(&RgbImage::new(64, 64), &src).is_none());
    }

    #[test]
    fn test_landmark_lands_on_reference() {
        let mut frame = RgbImage::new(200, 200);
        let src: [(f32, f32); 5] = [(80.0, 60.0), (120.0, 60.0), (100.0, 85.0), (85.0, 110.0), (115.0, 110.0)];

        // Bright patch at the left eye survives bilinear sampling.
        let (lx, ly) = (src[0].0 as u32, src[0].1 as u32);
        for y in ly - 2..=ly + 2 {
            for x in lx - 2..=lx + 2 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let aligned = align_face(&frame, &src).unwrap();
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));

        let (rx, ry) = (
            REFERENCE_LANDMARKS_112[0].0.round() as u32,
            REFERENCE_LANDMARKS_112[0].1.round() as u32,
        );
        let max = (ry - 1..=ry + 1)
            .flat_map(|y| (rx - 1..=rx + 1).map(move |x| (x, y)))
            .map(|(x, y)| aligned.get_pixel(x, y)[0])
            .max()
            .unwrap();
        assert!(max > 100, "expected bright patch near ({rx}, {ry}), max = {max}");
    }
}
