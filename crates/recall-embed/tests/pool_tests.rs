use candle_core::{DType, Device, Tensor};
use recall_embed::masked_mean_l2;

fn pooled(hidden: &[f32], shape: (usize, usize, usize), mask: &[f32]) -> Vec<Vec<f32>> {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(hidden, shape, &dev).unwrap();
    let m = Tensor::from_slice(mask, (shape.0, shape.1), &dev).unwrap();
    masked_mean_l2(&h, &m).unwrap().to_vec2().unwrap()
}

fn close(a: &[f32], b: &[f32]) -> bool { a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5) }

#[test]
fn padding_tokens_do_not_leak_into_the_mean() {
    // the padded second token would flip the direction if it were counted
    let v = pooled(&[0.0, 3.0, 4.0, -9.0, 0.0, 0.0], (1, 2, 3), &[1.0, 0.0]);
    assert!(close(&v[0], &[0.0, 0.6, 0.8]), "{v:?}");
}

#[test]
fn rows_are_pooled_independently_and_unit_length() {
    let v = pooled(&[3.0, 4.0, 0.0, 0.0, 0.0, 2.0, 0.0, 6.0], (2, 2, 2), &[1.0, 0.0, 1.0, 1.0]);
    assert!(close(&v[0], &[0.6, 0.8]));
    assert!(close(&v[1], &[0.0, 1.0]));
    for row in &v {
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}

#[test]
fn fully_masked_row_stays_finite() {
    let v = pooled(&[1.0, 1.0, 2.0, 2.0], (1, 2, 2), &[0.0, 0.0]);
    assert!(v[0].iter().all(|x| x.is_finite()));
}

#[test]
fn integer_masks_are_accepted() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(&[2.0f32, 0.0, 0.0, 5.0], (1, 2, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1i64, 0], (1, 2), &dev).unwrap();
    let v: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
    assert!(close(&v[0], &[1.0, 0.0]));
}

#[test]
fn rejects_two_dimensional_hidden() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((2, 1), DType::F32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
