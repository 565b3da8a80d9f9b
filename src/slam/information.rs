//! Information-form storage for online landmark SLAM
//!
//! Holds the information matrix Ω and information vector ξ of a state laid
//! out as `[pose_x, pose_y, lm0_x, lm0_y, lm1_x, lm1_y, ...]`. The backing
//! matrices are over-allocated and grown by doubling, so adding a landmark
//! only copies the live block when capacity runs out. Entries outside the
//! live `dim x dim` block are always zero.
//!
//! A motion step introduces a new pose and immediately eliminates the old
//! one. With the old pose `p`, the landmarks `L`, motion displacement `m`
//! and motion weight `w`, the expanded system is
//!
//! ```text
//!          p        p'      L             ξ
//! p   [ A + wI    -wI      B ]        [ a - w m ]
//! p'  [  -wI       wI      0 ]        [   w m   ]
//! L   [   Bᵀ       0       C ]        [    l    ]
//! ```
//!
//! and the Schur complement on `p` (with `S = A + wI`, `r = a - w m`) gives
//!
//! ```text
//! Ω_p'p' = wI - w² S⁻¹        ξ_p' = w m + w S⁻¹ r
//! Ω_p'L  = w S⁻¹ B            ξ_L  = l - Bᵀ S⁻¹ r
//! Ω_LL   = C - Bᵀ S⁻¹ B
//! ```
//!
//! which is written back in place: the new pose takes over rows/cols 0-1.

use crate::common::RoboticsResult;
use crate::linalg::Matrix;

/// Size of one block (a 2D position)
pub const BLOCK: usize = 2;

/// Offset of the robot pose block
pub const POSE: usize = 0;

/// Growable Ω/ξ pair
#[derive(Debug, Clone)]
pub struct InformationForm {
    omega: Matrix,
    xi: Matrix,
    dim: usize,
}

impl InformationForm {
    /// Pose-only system with a unit prior pinning the pose to the origin
    pub fn anchored(capacity: usize) -> Self {
        let capacity = capacity.max(BLOCK);
        let mut omega = Matrix::zeros(capacity, capacity);
        omega[(0, 0)] = 1.0;
        omega[(1, 1)] = 1.0;
        Self { omega, xi: Matrix::zeros(capacity, 1), dim: BLOCK }
    }

    /// Number of live rows/cols
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Allocated rows/cols
    pub fn capacity(&self) -> usize {
        self.omega.nrows()
    }

    /// Number of landmark blocks
    pub fn landmark_blocks(&self) -> usize {
        (self.dim - BLOCK) / BLOCK
    }

    /// Append a zero block and return its offset
    pub fn push_block(&mut self) -> RoboticsResult<usize> {
        let offset = self.dim;
        let needed = self.dim + BLOCK;
        if needed > self.capacity() {
            let old = self.capacity();
            let new_capacity = (old * 2).max(needed);
            let keep: Vec<usize> = (0..old).collect();
            self.omega = self.omega.expand(new_capacity, new_capacity, &keep, &keep)?;
            self.xi = self.xi.expand(new_capacity, 1, &keep, &[0])?;
            log::trace!("information store grown from {} to {}", old, new_capacity);
        }
        self.dim = needed;
        Ok(offset)
    }

    /// Add the soft constraint `block[to] - block[from] = displacement` with `weight`
    pub fn fuse(&mut self, from: usize, to: usize, displacement: [f64; 2], weight: f64) {
        for k in 0..BLOCK {
            self.omega[(from + k, from + k)] += weight;
            self.omega[(to + k, to + k)] += weight;
            self.omega[(from + k, to + k)] -= weight;
            self.omega[(to + k, from + k)] -= weight;
            self.xi[(from + k, 0)] -= displacement[k] * weight;
            self.xi[(to + k, 0)] += displacement[k] * weight;
        }
    }

    /// Replace the pose with one displaced by `motion`, marginalizing the old pose
    pub fn advance_pose(&mut self, motion: [f64; 2], weight: f64) -> RoboticsResult<()> {
        let pose: Vec<usize> = (POSE..POSE + BLOCK).collect();
        let landmarks: Vec<usize> = (BLOCK..self.dim).collect();

        let mut s = self.omega.take(&pose, None)?;
        let mut r = self.xi.take(&pose, Some(&[0][..]))?;
        for k in 0..BLOCK {
            s[(k, k)] += weight;
            r[(k, 0)] -= motion[k] * weight;
        }
        let s_inv = s.inverse()?;
        let s_inv_r = s_inv.mul(&r)?;

        let w_eye = Matrix::identity(BLOCK).scale(weight);
        let mut pose_pose = w_eye.sub(&s_inv.scale(weight * weight))?;
        let pose_xi = Matrix::column(&motion).scale(weight).add(&s_inv_r.scale(weight))?;

        if !landmarks.is_empty() {
            let b = self.omega.take(&pose, Some(landmarks.as_slice()))?;
            let c = self.omega.take(&landmarks, None)?;
            let l = self.xi.take(&landmarks, Some(&[0][..]))?;

            let s_inv_b = s_inv.mul(&b)?;
            let bt = b.transpose();
            let land_land = c.sub(&bt.mul(&s_inv_b)?)?;
            let pose_land = s_inv_b.scale(weight);
            let land_xi = l.sub(&bt.mul(&s_inv_r)?)?;

            self.omega.set_block(BLOCK, BLOCK, &land_land)?;
            self.omega.set_block(POSE, BLOCK, &pose_land)?;
            self.omega.set_block(BLOCK, POSE, &pose_land.transpose())?;
            self.xi.set_block(BLOCK, 0, &land_xi)?;
        }

        // keep the pose block exactly symmetric under rounding
        let off = 0.5 * (pose_pose[(0, 1)] + pose_pose[(1, 0)]);
        pose_pose[(0, 1)] = off;
        pose_pose[(1, 0)] = off;
        self.omega.set_block(POSE, POSE, &pose_pose)?;
        self.xi.set_block(POSE, 0, &pose_xi)?;
        Ok(())
    }

    /// Live information matrix
    pub fn omega(&self) -> RoboticsResult<Matrix> {
        let live: Vec<usize> = (0..self.dim).collect();
        self.omega.take(&live, None)
    }

    /// Live information vector
    pub fn xi(&self) -> RoboticsResult<Matrix> {
        let live: Vec<usize> = (0..self.dim).collect();
        self.xi.take(&live, Some(&[0][..]))
    }

    /// Mean of the belief, `Ω⁻¹ξ`
    pub fn solve(&self) -> RoboticsResult<Vec<f64>> {
        let mean = self.omega()?.solve(&self.xi()?)?;
        Ok((0..mean.nrows()).map(|i| mean[(i, 0)]).collect())
    }
}
