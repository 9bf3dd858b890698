use hyperslab_testkit::{DenseMask, HyperslabParams, MaskOp};

use crate::{SelectOp, Selection};

mod codec_tests;
mod combine_tests;

const OPS: [SelectOp; 6] = [
    SelectOp::Set,
    SelectOp::Or,
    SelectOp::And,
    SelectOp::Xor,
    SelectOp::NotB,
    SelectOp::NotA,
];

fn mask_op(op: SelectOp) -> MaskOp {
    match op {
        SelectOp::Set => MaskOp::Set,
        SelectOp::Or => MaskOp::Or,
        SelectOp::And => MaskOp::And,
        SelectOp::Xor => MaskOp::Xor,
        SelectOp::NotB => MaskOp::NotB,
        SelectOp::NotA => MaskOp::NotA,
    }
}

/// Dense image of a finite selection.
fn to_mask(selection: &Selection) -> DenseMask {
    DenseMask::from_fn(selection.extent(), |coords| selection.contains(coords))
}

fn params_mask(extent: &[u64], params: &HyperslabParams) -> DenseMask {
    DenseMask::hyperslab(
        extent,
        &params.start,
        &params.stride,
        &params.count,
        &params.block,
    )
}

fn select(selection: &mut Selection, op: SelectOp, params: &HyperslabParams) {
    selection
        .select_hyperslab(
            op,
            &params.start,
            Some(&params.stride),
            &params.count,
            Some(&params.block),
        )
        .unwrap();
}
