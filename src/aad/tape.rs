//! Reverse-mode tape over scalar, vector and matrix nodes.
//!
//! Every value produced during a pricing run is recorded as a node holding a
//! [`Tensor`] together with the operation that created it. A single reverse
//! sweep from the scalar price then accumulates adjoints back to the tracked
//! model parameters.
//!
//! Node handles are typed ([`ScalarVar`], [`VectorVar`], [`MatrixVar`]) so the
//! shape of every operand is checked at compile time; only vector lengths are
//! checked at run time (by `ndarray`).
//!
//! # Differentiation conventions
//!
//! - `select(mask, a, b)`: the adjoint flows to `a` where `mask` holds and to
//!   `b` elsewhere. Callers build `mask` with a strict comparison, so at a tie
//!   the `b` branch (continuation) receives the gradient.
//! - `positive_part(x)`: derivative 1 for `x > 0`, 0 otherwise.

use ndarray::{Array1, Array2, Zip};
use std::fmt;

/// Value held by a tape node.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    Scalar(f64),
    Vector(Array1<f64>),
    Matrix(Array2<f64>),
}

impl Tensor {
    pub fn kind(&self) -> &'static str {
        match self {
            Tensor::Scalar(_) => "scalar",
            Tensor::Vector(_) => "vector",
            Tensor::Matrix(_) => "matrix",
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Tensor::Scalar(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Array1<f64>> {
        match self {
            Tensor::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Array2<f64>> {
        match self {
            Tensor::Matrix(m) => Some(m),
            _ => None,
        }
    }

    fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        match self {
            Tensor::Scalar(x) => Tensor::Scalar(f(*x)),
            Tensor::Vector(v) => Tensor::Vector(Zip::from(v).par_map_collect(|&x| f(x))),
            Tensor::Matrix(m) => Tensor::Matrix(Zip::from(m).par_map_collect(|&x| f(x))),
        }
    }

    fn zip_map<F>(&self, other: &Tensor, f: F) -> Tensor
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        match (self, other) {
            (Tensor::Scalar(x), Tensor::Scalar(y)) => Tensor::Scalar(f(*x, *y)),
            (Tensor::Vector(x), Tensor::Vector(y)) => {
                Tensor::Vector(Zip::from(x).and(y).par_map_collect(|&a, &b| f(a, b)))
            }
            (Tensor::Matrix(x), Tensor::Matrix(y)) => {
                Tensor::Matrix(Zip::from(x).and(y).par_map_collect(|&a, &b| f(a, b)))
            }
            (a, b) => unreachable!("tensor kind mismatch: {} vs {}", a.kind(), b.kind()),
        }
    }

    fn accumulate(&mut self, other: Tensor) {
        match (self, other) {
            (Tensor::Scalar(x), Tensor::Scalar(y)) => *x += y,
            (Tensor::Vector(x), Tensor::Vector(y)) => *x += &y,
            (Tensor::Matrix(x), Tensor::Matrix(y)) => *x += &y,
            (a, b) => unreachable!("adjoint kind mismatch: {} vs {}", a.kind(), b.kind()),
        }
    }
}

/// Typed handle to a tape node.
pub trait TapeVar: Copy + fmt::Debug {
    fn node(self) -> usize;

    #[doc(hidden)]
    fn from_node(node: usize) -> Self;
}

macro_rules! tape_var {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl TapeVar for $name {
            #[inline]
            fn node(self) -> usize {
                self.0
            }

            #[inline]
            fn from_node(node: usize) -> Self {
                $name(node)
            }
        }
    };
}

tape_var!(ScalarVar);
tape_var!(VectorVar);
tape_var!(MatrixVar);

/// Local derivative rule for operations defined outside the tape.
///
/// `backward` returns one entry per parent, in the order the parents were
/// recorded. Entries for parents whose `needs_grad` flag is false may be `None`.
pub trait AdjointRule: fmt::Debug + Send + Sync {
    fn backward(
        &self,
        parents: &[&Tensor],
        output: &Tensor,
        adjoint: &Tensor,
        needs_grad: &[bool],
    ) -> Vec<Option<Tensor>>;
}

#[derive(Debug)]
enum Op {
    Input,
    Constant,
    Add(usize, usize),
    Sub(usize, usize),
    Mul(usize, usize),
    Scale(usize, f64),
    Exp(usize),
    PositivePart(usize),
    MulScalar { vector: usize, scalar: usize },
    ScalarSub { scalar: usize, vector: usize },
    Hadamard { arg: usize, weights: Array1<f64> },
    Select {
        mask: Array1<bool>,
        on_true: usize,
        on_false: usize,
    },
    Sum(usize),
    Custom {
        parents: Vec<usize>,
        rule: Box<dyn AdjointRule>,
    },
}

#[derive(Debug)]
struct Node {
    value: Tensor,
    op: Op,
    requires_grad: bool,
}

/// Adjoints produced by [`Tape::gradient`].
///
/// Only input nodes keep their adjoint after the sweep.
#[derive(Debug)]
pub struct Gradients {
    adjoints: Vec<Option<Tensor>>,
}

impl Gradients {
    /// d(target)/d(var); zero when `var` does not influence the target.
    pub fn wrt(&self, var: ScalarVar) -> f64 {
        self.adjoints
            .get(var.node())
            .and_then(|a| a.as_ref())
            .and_then(Tensor::as_scalar)
            .unwrap_or(0.0)
    }

    pub fn wrt_vector(&self, var: VectorVar) -> Option<&Array1<f64>> {
        self.adjoints
            .get(var.node())
            .and_then(|a| a.as_ref())
            .and_then(Tensor::as_vector)
    }

    pub fn wrt_matrix(&self, var: MatrixVar) -> Option<&Array2<f64>> {
        self.adjoints
            .get(var.node())
            .and_then(|a| a.as_ref())
            .and_then(Tensor::as_matrix)
    }
}

/// Reverse-mode tape.
#[derive(Debug, Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes currently held on tape.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, value: Tensor, op: Op, requires_grad: bool) -> usize {
        self.nodes.push(Node {
            value,
            op,
            requires_grad,
        });
        self.nodes.len() - 1
    }

    fn grad(&self, node: usize) -> bool {
        self.nodes[node].requires_grad
    }

    pub(crate) fn tensor(&self, node: usize) -> &Tensor {
        &self.nodes[node].value
    }

    fn scalar_at(&self, node: usize) -> f64 {
        match &self.nodes[node].value {
            Tensor::Scalar(x) => *x,
            other => unreachable!("expected scalar node, found {}", other.kind()),
        }
    }

    fn vector_at(&self, node: usize) -> &Array1<f64> {
        match &self.nodes[node].value {
            Tensor::Vector(v) => v,
            other => unreachable!("expected vector node, found {}", other.kind()),
        }
    }

    fn matrix_at(&self, node: usize) -> &Array2<f64> {
        match &self.nodes[node].value {
            Tensor::Matrix(m) => m,
            other => unreachable!("expected matrix node, found {}", other.kind()),
        }
    }

    /// Tracked scalar input: gradients are accumulated for it.
    pub fn input(&mut self, value: f64) -> ScalarVar {
        ScalarVar(self.push(Tensor::Scalar(value), Op::Input, true))
    }

    pub fn input_vector(&mut self, values: Array1<f64>) -> VectorVar {
        VectorVar(self.push(Tensor::Vector(values), Op::Input, true))
    }

    pub fn input_matrix(&mut self, values: Array2<f64>) -> MatrixVar {
        MatrixVar(self.push(Tensor::Matrix(values), Op::Input, true))
    }

    /// Untracked scalar: behaves as a constant in the reverse sweep.
    pub fn constant(&mut self, value: f64) -> ScalarVar {
        ScalarVar(self.push(Tensor::Scalar(value), Op::Constant, false))
    }

    pub fn constant_vector(&mut self, values: Array1<f64>) -> VectorVar {
        VectorVar(self.push(Tensor::Vector(values), Op::Constant, false))
    }

    pub fn constant_matrix(&mut self, values: Array2<f64>) -> MatrixVar {
        MatrixVar(self.push(Tensor::Matrix(values), Op::Constant, false))
    }

    pub fn value(&self, var: ScalarVar) -> f64 {
        self.scalar_at(var.node())
    }

    pub fn vector(&self, var: VectorVar) -> &Array1<f64> {
        self.vector_at(var.node())
    }

    pub fn matrix(&self, var: MatrixVar) -> &Array2<f64> {
        self.matrix_at(var.node())
    }

    /// True when `var` depends on at least one tracked input.
    pub fn requires_grad<V: TapeVar>(&self, var: V) -> bool {
        self.grad(var.node())
    }

    pub fn add<V: TapeVar>(&mut self, lhs: V, rhs: V) -> V {
        let (l, r) = (lhs.node(), rhs.node());
        let value = self.tensor(l).zip_map(self.tensor(r), |x, y| x + y);
        let grad = self.grad(l) || self.grad(r);
        V::from_node(self.push(value, Op::Add(l, r), grad))
    }

    pub fn sub<V: TapeVar>(&mut self, lhs: V, rhs: V) -> V {
        let (l, r) = (lhs.node(), rhs.node());
        let value = self.tensor(l).zip_map(self.tensor(r), |x, y| x - y);
        let grad = self.grad(l) || self.grad(r);
        V::from_node(self.push(value, Op::Sub(l, r), grad))
    }

    /// Elementwise product.
    pub fn mul<V: TapeVar>(&mut self, lhs: V, rhs: V) -> V {
        let (l, r) = (lhs.node(), rhs.node());
        let value = self.tensor(l).zip_map(self.tensor(r), |x, y| x * y);
        let grad = self.grad(l) || self.grad(r);
        V::from_node(self.push(value, Op::Mul(l, r), grad))
    }

    /// Multiply by a constant.
    pub fn scale<V: TapeVar>(&mut self, arg: V, c: f64) -> V {
        let a = arg.node();
        let value = self.tensor(a).map(|x| x * c);
        let grad = self.grad(a);
        V::from_node(self.push(value, Op::Scale(a, c), grad))
    }

    pub fn exp<V: TapeVar>(&mut self, arg: V) -> V {
        let a = arg.node();
        let value = self.tensor(a).map(f64::exp);
        let grad = self.grad(a);
        V::from_node(self.push(value, Op::Exp(a), grad))
    }

    /// `max(x, 0)` elementwise.
    pub fn positive_part<V: TapeVar>(&mut self, arg: V) -> V {
        let a = arg.node();
        let value = self.tensor(a).map(|x| x.max(0.0));
        let grad = self.grad(a);
        V::from_node(self.push(value, Op::PositivePart(a), grad))
    }

    /// Vector times scalar node.
    pub fn mul_scalar(&mut self, vector: VectorVar, scalar: ScalarVar) -> VectorVar {
        let (v, s) = (vector.node(), scalar.node());
        let factor = self.scalar_at(s);
        let value = Tensor::Vector(self.vector_at(v) * factor);
        let grad = self.grad(v) || self.grad(s);
        VectorVar(self.push(value, Op::MulScalar { vector: v, scalar: s }, grad))
    }

    /// `scalar - vector[i]` for every element.
    pub fn scalar_sub(&mut self, scalar: ScalarVar, vector: VectorVar) -> VectorVar {
        let (s, v) = (scalar.node(), vector.node());
        let c = self.scalar_at(s);
        let value = Tensor::Vector(self.vector_at(v).mapv(|x| c - x));
        let grad = self.grad(v) || self.grad(s);
        VectorVar(self.push(value, Op::ScalarSub { scalar: s, vector: v }, grad))
    }

    /// Elementwise product with a constant vector.
    pub fn hadamard(&mut self, arg: VectorVar, weights: Array1<f64>) -> VectorVar {
        let a = arg.node();
        let value = Tensor::Vector(
            Zip::from(self.vector_at(a))
                .and(&weights)
                .par_map_collect(|&x, &w| x * w),
        );
        let grad = self.grad(a);
        VectorVar(self.push(value, Op::Hadamard { arg: a, weights }, grad))
    }

    /// Differentiable `where(mask, on_true, on_false)`.
    pub fn select(
        &mut self,
        mask: Array1<bool>,
        on_true: VectorVar,
        on_false: VectorVar,
    ) -> VectorVar {
        let (t, f) = (on_true.node(), on_false.node());
        let value = Tensor::Vector(
            Zip::from(&mask)
                .and(self.vector_at(t))
                .and(self.vector_at(f))
                .par_map_collect(|&m, &x, &y| if m { x } else { y }),
        );
        let grad = self.grad(t) || self.grad(f);
        VectorVar(self.push(
            value,
            Op::Select {
                mask,
                on_true: t,
                on_false: f,
            },
            grad,
        ))
    }

    pub fn sum(&mut self, arg: VectorVar) -> ScalarVar {
        let a = arg.node();
        let value = Tensor::Scalar(self.vector_at(a).sum());
        let grad = self.grad(a);
        ScalarVar(self.push(value, Op::Sum(a), grad))
    }

    /// Record an operation whose local derivative is given by `rule`.
    pub fn record<V: TapeVar>(
        &mut self,
        value: Tensor,
        parents: Vec<usize>,
        rule: Box<dyn AdjointRule>,
    ) -> V {
        let grad = parents.iter().any(|&p| self.grad(p));
        V::from_node(self.push(value, Op::Custom { parents, rule }, grad))
    }

    /// Reverse sweep from `target`, seeding its adjoint with 1.
    pub fn gradient(&self, target: ScalarVar) -> Gradients {
        let mut adjoints: Vec<Option<Tensor>> = (0..self.nodes.len()).map(|_| None).collect();
        if self.grad(target.node()) {
            adjoints[target.node()] = Some(Tensor::Scalar(1.0));
        }

        for idx in (0..=target.node()).rev() {
            let Some(adjoint) = adjoints[idx].take() else {
                continue;
            };
            for (parent, contribution) in self.local_adjoints(idx, &adjoint) {
                if !self.grad(parent) {
                    continue;
                }
                match adjoints[parent].as_mut() {
                    Some(existing) => existing.accumulate(contribution),
                    None => adjoints[parent] = Some(contribution),
                }
            }
            if matches!(self.nodes[idx].op, Op::Input) {
                adjoints[idx] = Some(adjoint);
            }
        }

        Gradients { adjoints }
    }

    fn local_adjoints(&self, idx: usize, adjoint: &Tensor) -> Vec<(usize, Tensor)> {
        let node = &self.nodes[idx];
        match &node.op {
            Op::Input | Op::Constant => Vec::new(),
            Op::Add(a, b) => vec![(*a, adjoint.clone()), (*b, adjoint.clone())],
            Op::Sub(a, b) => vec![(*a, adjoint.clone()), (*b, adjoint.map(|g| -g))],
            Op::Mul(a, b) => {
                let mut out = Vec::with_capacity(2);
                if self.grad(*a) {
                    out.push((*a, adjoint.zip_map(self.tensor(*b), |g, y| g * y)));
                }
                if self.grad(*b) {
                    out.push((*b, adjoint.zip_map(self.tensor(*a), |g, x| g * x)));
                }
                out
            }
            Op::Scale(a, c) => {
                let c = *c;
                vec![(*a, adjoint.map(|g| g * c))]
            }
            Op::Exp(a) => vec![(*a, adjoint.zip_map(&node.value, |g, y| g * y))],
            Op::PositivePart(a) => vec![(
                *a,
                adjoint.zip_map(self.tensor(*a), |g, x| if x > 0.0 { g } else { 0.0 }),
            )],
            Op::MulScalar { vector, scalar } => {
                let g = vector_adjoint(adjoint);
                let mut out = Vec::with_capacity(2);
                if self.grad(*vector) {
                    out.push((*vector, Tensor::Vector(g * self.scalar_at(*scalar))));
                }
                if self.grad(*scalar) {
                    out.push((*scalar, Tensor::Scalar(g.dot(self.vector_at(*vector)))));
                }
                out
            }
            Op::ScalarSub { scalar, vector } => {
                let g = vector_adjoint(adjoint);
                let mut out = Vec::with_capacity(2);
                if self.grad(*scalar) {
                    out.push((*scalar, Tensor::Scalar(g.sum())));
                }
                if self.grad(*vector) {
                    out.push((*vector, Tensor::Vector(-g)));
                }
                out
            }
            Op::Hadamard { arg, weights } => {
                let g = vector_adjoint(adjoint);
                vec![(*arg, Tensor::Vector(g * weights))]
            }
            Op::Select {
                mask,
                on_true,
                on_false,
            } => {
                let g = vector_adjoint(adjoint);
                let mut out = Vec::with_capacity(2);
                if self.grad(*on_true) {
                    let routed = Zip::from(g)
                        .and(mask)
                        .par_map_collect(|&g, &m| if m { g } else { 0.0 });
                    out.push((*on_true, Tensor::Vector(routed)));
                }
                if self.grad(*on_false) {
                    let routed = Zip::from(g)
                        .and(mask)
                        .par_map_collect(|&g, &m| if m { 0.0 } else { g });
                    out.push((*on_false, Tensor::Vector(routed)));
                }
                out
            }
            Op::Sum(a) => {
                let g = adjoint.as_scalar().unwrap_or(0.0);
                let n = self.vector_at(*a).len();
                vec![(*a, Tensor::Vector(Array1::from_elem(n, g)))]
            }
            Op::Custom { parents, rule } => {
                let values: Vec<&Tensor> = parents.iter().map(|&p| self.tensor(p)).collect();
                let needs: Vec<bool> = parents.iter().map(|&p| self.grad(p)).collect();
                rule.backward(&values, &node.value, adjoint, &needs)
                    .into_iter()
                    .zip(parents.iter())
                    .filter_map(|(contribution, &p)| contribution.map(|c| (p, c)))
                    .collect()
            }
        }
    }
}

fn vector_adjoint(adjoint: &Tensor) -> &Array1<f64> {
    match adjoint {
        Tensor::Vector(g) => g,
        other => unreachable!("expected vector adjoint, found {}", other.kind()),
    }
}
