//! Structured description of convolution-shaped contractions.
//!
//! Instead of an einsum string such as `nc(p*2+r-1)(q*2+s-1),kcrs->nkpq`,
//! a contraction is a [`ContractionPattern`]: each axis of the two operands
//! and of the output names an [`IndexRole`], and the spatial axes of the
//! left operand may be an [`AffineIndex`] combining two roles.

use std::fmt;

/// Loop index of a convolution contraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexRole {
    /// `n`
    Batch,
    /// `c`
    InChannel,
    /// `k`
    OutChannel,
    /// `r`
    KernelRow,
    /// `s`
    KernelCol,
    /// `p`, a row of the contraction output.
    OutRow,
    /// `q`, a column of the contraction output.
    OutCol,
}

impl IndexRole {
    pub const COUNT: usize = 7;

    pub const ALL: [IndexRole; Self::COUNT] = [
        IndexRole::Batch,
        IndexRole::InChannel,
        IndexRole::OutChannel,
        IndexRole::KernelRow,
        IndexRole::KernelCol,
        IndexRole::OutRow,
        IndexRole::OutCol,
    ];

    /// Position of this role in a [`RoleValues`] array.
    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }

    /// Conventional einsum letter.
    pub fn letter(self) -> char {
        match self {
            IndexRole::Batch => 'n',
            IndexRole::InChannel => 'c',
            IndexRole::OutChannel => 'k',
            IndexRole::KernelRow => 'r',
            IndexRole::KernelCol => 's',
            IndexRole::OutRow => 'p',
            IndexRole::OutCol => 'q',
        }
    }
}

/// Current value of every role, indexed by [`IndexRole::slot`].
pub type RoleValues = [usize; IndexRole::COUNT];

/// Sign with which the inner role enters an affine index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Add,
    Subtract,
}

/// `outer * stride ± inner + offset`, in logical (unpadded) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffineIndex {
    pub outer: IndexRole,
    pub stride: usize,
    pub inner: IndexRole,
    pub direction: Direction,
    pub offset: isize,
}

impl AffineIndex {
    #[inline]
    pub fn eval(&self, values: &RoleValues) -> isize {
        let outer = (values[self.outer.slot()] * self.stride) as isize;
        let inner = values[self.inner.slot()] as isize;
        match self.direction {
            Direction::Add => outer + inner + self.offset,
            Direction::Subtract => outer - inner + self.offset,
        }
    }
}

impl fmt::Display for AffineIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.outer.letter())?;
        if self.stride != 1 {
            write!(f, "*{}", self.stride)?;
        }
        let sign = match self.direction {
            Direction::Add => '+',
            Direction::Subtract => '-',
        };
        write!(f, "{sign}{}", self.inner.letter())?;
        if self.offset != 0 {
            write!(f, "{:+}", self.offset)?;
        }
        write!(f, ")")
    }
}

/// Subscript of one left-operand axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscript {
    Index(IndexRole),
    Affine(AffineIndex),
}

impl Subscript {
    /// Whether `role` occurs in this subscript.
    pub fn mentions(&self, role: IndexRole) -> bool {
        match self {
            Subscript::Index(r) => *r == role,
            Subscript::Affine(a) => a.outer == role || a.inner == role,
        }
    }
}

impl fmt::Display for Subscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscript::Index(r) => write!(f, "{}", r.letter()),
            Subscript::Affine(a) => write!(f, "{a}"),
        }
    }
}

/// `output[output] = Σ lhs[lhs] · rhs[rhs]` over every role absent from the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractionPattern {
    pub lhs: [Subscript; 4],
    pub rhs: [IndexRole; 4],
    pub output: [IndexRole; 4],
}

fn spatial(
    outer: IndexRole,
    stride: usize,
    inner: IndexRole,
    direction: Direction,
    offset: isize,
) -> Subscript {
    Subscript::Affine(AffineIndex {
        outer,
        stride,
        inner,
        direction,
        offset,
    })
}

impl ContractionPattern {
    /// `y[n,k,p,q] = Σ_{c,r,s} x[n, c, p·sh + r − ph, q·sw + s − pw] · w[k,c,r,s]`
    pub fn conv_forward(stride: (usize, usize), padding: (usize, usize)) -> Self {
        use IndexRole::*;
        Self {
            lhs: [
                Subscript::Index(Batch),
                Subscript::Index(InChannel),
                spatial(OutRow, stride.0, KernelRow, Direction::Add, -(padding.0 as isize)),
                spatial(OutCol, stride.1, KernelCol, Direction::Add, -(padding.1 as isize)),
            ],
            rhs: [OutChannel, InChannel, KernelRow, KernelCol],
            output: [Batch, OutChannel, OutRow, OutCol],
        }
    }

    /// `dw[k,c,r,s] = Σ_{n,p,q} x[n, c, p·sh + r − ph, q·sw + s − pw] · dy[n,k,p,q]`
    pub fn conv_weight_grad(stride: (usize, usize), padding: (usize, usize)) -> Self {
        use IndexRole::*;
        Self {
            lhs: [
                Subscript::Index(Batch),
                Subscript::Index(InChannel),
                spatial(OutRow, stride.0, KernelRow, Direction::Add, -(padding.0 as isize)),
                spatial(OutCol, stride.1, KernelCol, Direction::Add, -(padding.1 as isize)),
            ],
            rhs: [Batch, OutChannel, OutRow, OutCol],
            output: [OutChannel, InChannel, KernelRow, KernelCol],
        }
    }

    /// Stride-1 sub-convolution of one residue class of the input gradient:
    /// `dx'[n,c,p,q] = Σ_{k,r,s} dy[n, k, p − r + shift_h, q − s + shift_w] · w'[k,c,r,s]`.
    pub fn conv_input_grad(shift: (usize, usize)) -> Self {
        use IndexRole::*;
        Self {
            lhs: [
                Subscript::Index(Batch),
                Subscript::Index(OutChannel),
                spatial(OutRow, 1, KernelRow, Direction::Subtract, shift.0 as isize),
                spatial(OutCol, 1, KernelCol, Direction::Subtract, shift.1 as isize),
            ],
            rhs: [OutChannel, InChannel, KernelRow, KernelCol],
            output: [Batch, InChannel, OutRow, OutCol],
        }
    }

    /// Whether `role` occurs anywhere in the left operand.
    pub fn lhs_mentions(&self, role: IndexRole) -> bool {
        self.lhs.iter().any(|s| s.mentions(role))
    }

    /// Whether `role` indexes an axis of the right operand.
    pub fn rhs_mentions(&self, role: IndexRole) -> bool {
        self.rhs.contains(&role)
    }

    /// Whether `role` indexes an axis of the output.
    pub fn output_mentions(&self, role: IndexRole) -> bool {
        self.output.contains(&role)
    }
}

impl fmt::Display for ContractionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.lhs {
            write!(f, "{s}")?;
        }
        write!(f, ",")?;
        for r in &self.rhs {
            write!(f, "{}", r.letter())?;
        }
        write!(f, "->")?;
        for r in &self.output {
            write!(f, "{}", r.letter())?;
        }
        Ok(())
    }
}
