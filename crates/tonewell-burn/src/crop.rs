//! Causal alignment of `[batch, channel, time]` tensors.
//!
//! Unpadded causal convolutions shorten the time axis from the left. Aligning two
//! tensors means keeping their most recent samples, so every crop here trims
//! the start of the time axis and never the end.

use burn::prelude::*;
use tonewell_core::Error;

/// Keep the last `length` samples of `x`.
pub fn causal_crop<B: Backend>(x: Tensor<B, 3>, length: usize) -> Result<Tensor<B, 3>, Error> {
    let time = x.dims()[2];
    if length > time {
        return Err(Error::ShapeMismatch {
            what: "causal crop length",
            expected: vec![time],
            actual: vec![length],
        });
    }
    Ok(crop_tail(x, length))
}

/// Keep the last `length` samples where `length <= time` holds by construction.
pub(crate) fn crop_tail<B: Backend>(x: Tensor<B, 3>, length: usize) -> Tensor<B, 3> {
    let [batch, channels, time] = x.dims();
    if length == time {
        return x;
    }
    x.slice([0..batch, 0..channels, time - length..time])
}

/// Crop the longer of two tensors so both end on the same most recent sample.
pub fn causal_crop_pair<B: Backend>(
    a: Tensor<B, 3>,
    b: Tensor<B, 3>,
) -> Result<(Tensor<B, 3>, Tensor<B, 3>), Error> {
    let [ba, ca, ta] = a.dims();
    let [bb, cb, tb] = b.dims();
    if ba != bb || ca != cb {
        return Err(Error::ShapeMismatch {
            what: "causal crop pair",
            expected: vec![ba, ca],
            actual: vec![bb, cb],
        });
    }
    let length = ta.min(tb);
    Ok((causal_crop(a, length)?, causal_crop(b, length)?))
}

/// Prepend `padding` zeros on the time axis.
pub fn pad_left<B: Backend>(x: Tensor<B, 3>, padding: usize) -> Tensor<B, 3> {
    if padding == 0 {
        return x;
    }
    let [batch, channels, _] = x.dims();
    let zeros = Tensor::zeros([batch, channels, padding], &x.device());
    Tensor::cat(vec![zeros, x], 2)
}

/// Append `padding` zeros on the time axis.
pub fn pad_right<B: Backend>(x: Tensor<B, 3>, padding: usize) -> Tensor<B, 3> {
    if padding == 0 {
        return x;
    }
    let [batch, channels, _] = x.dims();
    let zeros = Tensor::zeros([batch, channels, padding], &x.device());
    Tensor::cat(vec![x, zeros], 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;
    use proptest::prelude::*;

    type TestBackend = NdArray<f32>;

    fn ramp(batch: usize, channels: usize, time: usize) -> Tensor<TestBackend, 3> {
        let data: Vec<f32> = (0..batch * channels * time).map(|i| i as f32).collect();
        Tensor::from_data(
            TensorData::new(data, [batch, channels, time]),
            &NdArrayDevice::default(),
        )
    }

    fn values(x: Tensor<TestBackend, 3>) -> Vec<f32> {
        x.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_crop_keeps_most_recent() {
        let x = ramp(1, 1, 6);
        let cropped = causal_crop(x, 4).unwrap();
        assert_eq!(values(cropped), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_crop_longer_than_input_fails() {
        assert!(matches!(
            causal_crop(ramp(1, 1, 3), 4),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_pair_rejects_batch_mismatch() {
        assert!(causal_crop_pair(ramp(2, 1, 5), ramp(1, 1, 5)).is_err());
    }

    #[test]
    fn test_padding() {
        let x = ramp(1, 1, 2);
        assert_eq!(values(pad_left(x.clone(), 2)), vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(values(pad_right(x, 1)), vec![0.0, 1.0, 0.0]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_pair_preserves_tail(
            batch in 1usize..3,
            channels in 1usize..3,
            t1 in 1usize..24,
            shrink in 0usize..24,
        ) {
            let t2 = t1 - shrink.min(t1 - 1);
            let long = ramp(batch, channels, t1);
            let short = ramp(batch, channels, t2);
            let (a, b) = causal_crop_pair(long.clone(), short).unwrap();
            prop_assert_eq!(a.dims(), [batch, channels, t2]);
            prop_assert_eq!(b.dims(), [batch, channels, t2]);

            let long = values(long);
            let a = values(a);
            for bc in 0..batch * channels {
                let expected = &long[bc * t1 + (t1 - t2)..(bc + 1) * t1];
                prop_assert_eq!(&a[bc * t2..(bc + 1) * t2], expected);
            }
        }
    }
}
