use crate::{Error, Operand};

use super::{
    op::{GradFn, Op, _BinOp, BCE_EPS},
    Graph, Node,
};

// -----------------------------------------------------------------------------
// fallible builders
// -----------------------------------------------------------------------------
impl Graph {
    /// `lhs + rhs` where either side may be a node, a number or a numeric text.
    #[inline]
    pub fn try_add(&self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self._binary(_BinOp::Add, lhs.into(), rhs.into())
    }

    #[inline]
    pub fn try_sub(&self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self._binary(_BinOp::Sub, lhs.into(), rhs.into())
    }

    #[inline]
    pub fn try_mul(&self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self._binary(_BinOp::Mul, lhs.into(), rhs.into())
    }

    #[inline]
    pub fn try_div(&self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self._binary(_BinOp::Div, lhs.into(), rhs.into())
    }

    /// Build a node with a user supplied value and local gradient.
    ///
    /// `grad_fn` must return one gradient per operand, in the order of `operands`.
    /// A wrong count is reported by [Node::backward] as [Error::ArityMismatch].
    pub fn custom(
        &self,
        name: impl Into<String>,
        operands: &[&Node],
        value: f64,
        grad_fn: GradFn,
    ) -> Result<Node, Error> {
        if operands.iter().any(|node| !Graph::ptr_eq(self, &node.graph)) {
            return Err(Error::DifferentGraphs("custom"));
        }
        let operands = operands.iter().map(|node| node.index).collect();
        let op = Op::Custom {
            name: name.into(),
            grad_fn,
        };
        let index = self.0.borrow_mut().tape._make_nary(operands, value, op);
        Ok(Node::_registered(self, index))
    }

    #[inline]
    fn _binary(&self, op: _BinOp, lhs: Operand, rhs: Operand) -> Result<Node, Error> {
        let lhs = self._operand_node(lhs)?;
        let rhs = self._operand_node(rhs)?;
        lhs._try_binary(op, &rhs)
    }
}

impl Node {
    /// `self + rhs`.
    #[inline]
    pub fn try_add(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_add(self, rhs)
    }

    /// `lhs + self`, for a left operand which is not a node.
    #[inline]
    pub fn try_radd(&self, lhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_add(lhs, self)
    }

    #[inline]
    pub fn try_sub(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_sub(self, rhs)
    }

    #[inline]
    pub fn try_rsub(&self, lhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_sub(lhs, self)
    }

    #[inline]
    pub fn try_mul(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_mul(self, rhs)
    }

    #[inline]
    pub fn try_rmul(&self, lhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_mul(lhs, self)
    }

    #[inline]
    pub fn try_div(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_div(self, rhs)
    }

    #[inline]
    pub fn try_rdiv(&self, lhs: impl Into<Operand>) -> Result<Node, Error> {
        self.graph.try_div(lhs, self)
    }
}

// impls
impl Node {
    #[inline]
    pub(super) fn _try_binary(&self, op: _BinOp, rhs: &Node) -> Result<Node, Error> {
        if !Graph::ptr_eq(&self.graph, &rhs.graph) {
            return Err(Error::DifferentGraphs(op._name()));
        }
        Ok(self._binary_unchecked(op, rhs))
    }

    #[inline]
    fn _binary_unchecked(&self, op: _BinOp, rhs: &Node) -> Node {
        let index = self
            .graph
            .0
            .borrow_mut()
            .tape
            ._make_binary(self.index, rhs.index, |l, r| op._forward(l, r));
        Node::_registered(&self.graph, index)
    }

    #[inline]
    fn _unary(&self, f: impl FnOnce(f64) -> (f64, Op)) -> Node {
        let index = self.graph.0.borrow_mut().tape._make_unary(self.index, f);
        Node::_registered(&self.graph, index)
    }
}

// -----------------------------------------------------------------------------
// arithmetic operations
// -----------------------------------------------------------------------------
impl std::ops::Neg for &Node {
    type Output = Node;

    #[inline]
    fn neg(self) -> Self::Output {
        self._unary(|v| (-v, Op::Neg))
    }
}

impl std::ops::Neg for Node {
    type Output = Node;

    #[inline]
    fn neg(self) -> Self::Output {
        -&self
    }
}

macro_rules! _define_arithmetic_binary {
    ($tr:ident, $fn:ident, $ass_tr:ident, $ass_fn:ident, $op:expr) => {
        impl std::ops::$tr<&Node> for &Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: &Node) -> Self::Output {
                if !Graph::ptr_eq(&self.graph, &rhs.graph) {
                    panic!(
                        "Cannot {} nodes from different graphs: lhs.graph={:?}, rhs.graph={:?}",
                        stringify!($tr),
                        self.graph._debug_ptr(),
                        rhs.graph._debug_ptr()
                    );
                }
                self._binary_unchecked($op, rhs)
            }
        }
        impl std::ops::$tr<Node> for &Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: Node) -> Self::Output {
                std::ops::$tr::$fn(self, &rhs)
            }
        }
        impl std::ops::$tr<&Node> for Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: &Node) -> Self::Output {
                std::ops::$tr::$fn(&self, rhs)
            }
        }
        impl std::ops::$tr<Node> for Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: Node) -> Self::Output {
                std::ops::$tr::$fn(&self, &rhs)
            }
        }
        impl std::ops::$tr<f64> for &Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: f64) -> Self::Output {
                let rhs = self.graph.constant(rhs);
                self._binary_unchecked($op, &rhs)
            }
        }
        impl std::ops::$tr<f64> for Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: f64) -> Self::Output {
                std::ops::$tr::$fn(&self, rhs)
            }
        }
        // reflected forms: the number is promoted first and stays on the left
        impl std::ops::$tr<&Node> for f64 {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: &Node) -> Self::Output {
                let lhs = rhs.graph.constant(self);
                lhs._binary_unchecked($op, rhs)
            }
        }
        impl std::ops::$tr<Node> for f64 {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: Node) -> Self::Output {
                std::ops::$tr::$fn(self, &rhs)
            }
        }
        impl std::ops::$ass_tr<&Node> for Node {
            #[inline]
            fn $ass_fn(&mut self, rhs: &Node) {
                *self = std::ops::$tr::$fn(&*self, rhs);
            }
        }
        impl std::ops::$ass_tr<Node> for Node {
            #[inline]
            fn $ass_fn(&mut self, rhs: Node) {
                *self = std::ops::$tr::$fn(&*self, &rhs);
            }
        }
        impl std::ops::$ass_tr<f64> for Node {
            #[inline]
            fn $ass_fn(&mut self, rhs: f64) {
                *self = std::ops::$tr::$fn(&*self, rhs);
            }
        }
    };
}

_define_arithmetic_binary!(Add, add, AddAssign, add_assign, _BinOp::Add);
_define_arithmetic_binary!(Sub, sub, SubAssign, sub_assign, _BinOp::Sub);
_define_arithmetic_binary!(Mul, mul, MulAssign, mul_assign, _BinOp::Mul);
_define_arithmetic_binary!(Div, div, DivAssign, div_assign, _BinOp::Div);

// -----------------------------------------------------------------------------
// elementary functions
// -----------------------------------------------------------------------------
impl Node {
    #[inline]
    pub fn exp(&self) -> Node {
        self._unary(|v| {
            let value = v.exp();
            (value, Op::Exp { value })
        })
    }

    /// Natural logarithm.
    #[inline]
    pub fn log(&self) -> Node {
        self._unary(|arg| (arg.ln(), Op::Log { arg }))
    }

    #[inline]
    pub fn sqrt(&self) -> Node {
        self._unary(|v| {
            let value = v.sqrt();
            (value, Op::Sqrt { value })
        })
    }

    #[inline]
    pub fn powi(&self, exp: i32) -> Node {
        self._unary(|arg| (arg.powi(exp), Op::Powi { arg, exp }))
    }

    #[inline]
    pub fn tanh(&self) -> Node {
        self._unary(|v| {
            let value = v.tanh();
            (value, Op::Tanh { value })
        })
    }

    /// Binary cross entropy of this node, read as a probability, against a fixed target.
    ///
    /// `-0.5 * t * ln(p + eps) - 0.5 * (1 - t) * ln(1 - p + eps)` with `eps = 1e-4`.
    /// The target is a constant, so the result has this node as its only operand.
    #[inline]
    pub fn binary_cross_entropy(&self, target: f64) -> Node {
        self._unary(|prob| {
            let value = -0.5 * target * (prob + BCE_EPS).ln()
                - 0.5 * (1.0 - target) * (1.0 - prob + BCE_EPS).ln();
            (value, Op::Bce { target, prob })
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(1.0, 0.0)]
    #[case(4.0, 1.0)]
    #[case(-3.5, 4.0)]
    #[case(-3.5, -3.5)]
    fn test_add(#[case] lhs: f64, #[case] rhs: f64) {
        let graph = Graph::new();
        let x = graph.variable(lhs);
        let y = graph.variable(rhs);

        let z = &x + &y;
        z.backward().unwrap();

        assert_eq!(z.value(), lhs + rhs);
        assert_eq!(x.grad(), 1.0);
        assert_eq!(y.grad(), 1.0);
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(4.0, 1.0)]
    #[case(-3.5, 4.0)]
    fn test_sub(#[case] lhs: f64, #[case] rhs: f64) {
        let graph = Graph::new();
        let x = graph.variable(lhs);
        let y = graph.variable(rhs);

        let z = &x - &y;
        z.backward().unwrap();

        assert_eq!(z.value(), lhs - rhs);
        assert_eq!(x.grad(), 1.0);
        assert_eq!(y.grad(), -1.0);
    }

    #[rstest]
    #[case(2.0, 3.0)]
    #[case(0.0, 4.0)]
    #[case(-3.5, -3.5)]
    fn test_mul(#[case] lhs: f64, #[case] rhs: f64) {
        let graph = Graph::new();
        let x = graph.variable(lhs);
        let y = graph.variable(rhs);

        let z = &x * &y;
        z.backward().unwrap();

        assert_eq!(z.value(), lhs * rhs);
        assert_eq!(x.grad(), rhs);
        assert_eq!(y.grad(), lhs);
    }

    #[rstest]
    #[case(6.0, 3.0)]
    #[case(1.0, 4.0)]
    #[case(-3.5, -3.5)]
    fn test_div(#[case] lhs: f64, #[case] rhs: f64) {
        let graph = Graph::new();
        let x = graph.variable(lhs);
        let y = graph.variable(rhs);

        let z = &x / &y;
        z.backward().unwrap();

        assert_eq!(z.value(), lhs / rhs);
        approx::assert_abs_diff_eq!(x.grad(), 1.0 / rhs, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(y.grad(), -lhs / (rhs * rhs), epsilon = 1e-9);
    }

    #[rstest]
    #[case(0.0)]
    #[case(4.0)]
    #[case(-3.5)]
    fn test_neg(#[case] input: f64) {
        let graph = Graph::new();
        let x = graph.variable(input);

        let y = -&x;
        y.backward().unwrap();

        assert_eq!(y.value(), -input);
        assert_eq!(x.grad(), -1.0);
    }

    #[test]
    fn test_owned_operands() {
        let graph = Graph::new();
        let x = graph.variable(2.0);
        let y = graph.variable(5.0);

        let z = x.clone() * y.clone() - x.clone() + (-y.clone());
        z.backward().unwrap();

        assert_eq!(z.value(), 2.0 * 5.0 - 2.0 - 5.0);
        assert_eq!(x.grad(), 4.0);
        assert_eq!(y.grad(), 1.0);
    }

    #[rstest]
    #[case(4.0, 1.5)]
    #[case(-3.5, 2.0)]
    fn test_scalar_rhs(#[case] lhs: f64, #[case] rhs: f64) {
        let graph = Graph::new();
        let x = graph.variable(lhs);

        let add = &x + rhs;
        let sub = &x - rhs;
        let mul = &x * rhs;
        let div = &x / rhs;
        let total = &(&(&add + &sub) + &mul) + &div;
        total.backward().unwrap();

        assert_eq!(add.value(), lhs + rhs);
        assert_eq!(sub.value(), lhs - rhs);
        assert_eq!(mul.value(), lhs * rhs);
        assert_eq!(div.value(), lhs / rhs);
        approx::assert_abs_diff_eq!(x.grad(), 2.0 + rhs + 1.0 / rhs, epsilon = 1e-12);
    }

    #[rstest]
    #[case(4.0, 1.5)]
    #[case(-3.5, 2.0)]
    fn test_scalar_lhs(#[case] lhs: f64, #[case] rhs: f64) {
        let graph = Graph::new();
        let y = graph.variable(rhs);

        let add = lhs + &y;
        let sub = lhs - &y;
        let mul = lhs * &y;
        let div = lhs / &y;
        let total = &(&(&add + &sub) + &mul) + &div;
        total.backward().unwrap();

        assert_eq!(add.value(), lhs + rhs);
        assert_eq!(sub.value(), lhs - rhs);
        assert_eq!(mul.value(), lhs * rhs);
        assert_eq!(div.value(), lhs / rhs);
        approx::assert_abs_diff_eq!(
            y.grad(),
            1.0 - 1.0 + lhs - lhs / (rhs * rhs),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_reflected_keeps_operand_order() {
        let graph = Graph::new();
        let y = graph.variable(2.0);

        let z = 5.0 - &y;
        let operands = z.operands();

        assert_eq!(z.value(), 3.0);
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[0].value(), 5.0);
        assert!(operands[0].is_leaf());
        assert!(!operands[0].requires_grad());
        assert!(Node::ptr_eq(&operands[1], &y));
    }

    #[test]
    fn test_assign_ops() {
        let graph = Graph::new();
        let x = graph.variable(3.0);

        let mut acc = graph.constant(1.0);
        acc += &x;
        acc *= 2.0;
        acc -= x.clone();
        acc /= &x;
        acc.backward().unwrap();

        // acc = (2 (1 + x) - x) / x = 1 + 2 / x
        approx::assert_abs_diff_eq!(acc.value(), 1.0 + 2.0 / 3.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(x.grad(), -2.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    #[should_panic(expected = "Cannot Add nodes from different graphs")]
    fn test_add_panics_on_different_graphs() {
        let x = Graph::new().variable(1.0);
        let y = Graph::new().variable(2.0);

        let _ = &x + &y;
    }

    #[test]
    fn test_try_ops() {
        let graph = Graph::new();
        let x = graph.variable(2.0);

        let add = x.try_add(1).unwrap();
        let radd = x.try_radd("1.5").unwrap();
        let sub = x.try_sub(0.5).unwrap();
        let rsub = x.try_rsub(10).unwrap();
        let mul = x.try_mul(&x).unwrap();
        let rmul = x.try_rmul(3.0f32).unwrap();
        let div = x.try_div("4").unwrap();
        let rdiv = x.try_rdiv(1).unwrap();

        assert_eq!(add.value(), 3.0);
        assert_eq!(radd.value(), 3.5);
        assert_eq!(sub.value(), 1.5);
        assert_eq!(rsub.value(), 8.0);
        assert_eq!(mul.value(), 4.0);
        assert_eq!(rmul.value(), 6.0);
        assert_eq!(div.value(), 0.5);
        assert_eq!(rdiv.value(), 0.5);

        rsub.backward().unwrap();
        assert_eq!(x.grad(), -1.0);
    }

    #[test]
    fn test_graph_try_ops_on_numbers() {
        let graph = Graph::new();

        let z = graph.try_mul(2, "3").unwrap();
        z.backward().unwrap();

        assert_eq!(z.value(), 6.0);
        assert_eq!(z.operands()[0].grad(), 3.0);
        assert_eq!(z.operands()[1].grad(), 2.0);
    }

    #[test]
    fn test_try_ops_err_conversion() {
        let graph = Graph::new();
        let x = graph.variable(2.0);

        let err = x.try_add("two").unwrap_err();

        assert!(matches!(err, Error::ConversionError { .. }));
        assert_eq!(graph.num_nodes(), 1);
    }

    #[test]
    fn test_try_ops_err_different_graphs() {
        let x = Graph::new().variable(1.0);
        let y = Graph::new().variable(2.0);

        assert_eq!(x.try_mul(&y).unwrap_err(), Error::DifferentGraphs("mul"));
        assert_eq!(x.try_rsub(&y).unwrap_err(), Error::DifferentGraphs("sub"));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_try_ops_err_invalid_operand_type() {
        let graph = Graph::new();
        let x = graph.variable(1.0);

        let err = Operand::try_from(serde_json::json!([1, 2]))
            .and_then(|rhs| x.try_add(rhs))
            .unwrap_err();

        assert_eq!(
            err,
            Error::InvalidOperandType {
                type_name: "array".to_string()
            }
        );
    }

    #[test]
    fn test_requires_grad_propagation() {
        let graph = Graph::new();
        let x = graph.variable(1.0);
        let c = graph.constant(2.0);

        assert!((&x * &c).requires_grad());
        assert!(!(&c * 3.0).requires_grad());
        assert!(x.exp().requires_grad());
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-3.5)]
    fn test_exp(#[case] input: f64) {
        let graph = Graph::new();
        let x = graph.variable(input);

        let y = x.exp();
        y.backward().unwrap();

        assert_eq!(y.value(), input.exp());
        assert_eq!(x.grad(), input.exp());
    }

    #[rstest]
    #[case(0.5)]
    #[case(1.0)]
    #[case(4.0)]
    fn test_log(#[case] input: f64) {
        let graph = Graph::new();
        let x = graph.variable(input);

        let y = x.log();
        y.backward().unwrap();

        assert_eq!(y.value(), input.ln());
        assert_eq!(x.grad(), 1.0 / input);
    }

    #[rstest]
    #[case(0.5)]
    #[case(4.0)]
    fn test_sqrt(#[case] input: f64) {
        let graph = Graph::new();
        let x = graph.variable(input);

        let y = x.sqrt();
        y.backward().unwrap();

        assert_eq!(y.value(), input.sqrt());
        approx::assert_abs_diff_eq!(x.grad(), 1.0 / (2.0 * input.sqrt()), epsilon = 1e-12);
    }

    #[rstest]
    #[case(0.5, 0)]
    #[case(4.0, 2)]
    #[case(3.5, -4)]
    fn test_powi(#[case] input: f64, #[case] exp: i32) {
        let graph = Graph::new();
        let x = graph.variable(input);

        let y = x.powi(exp);
        y.backward().unwrap();

        assert_eq!(y.value(), input.powi(exp));
        assert_eq!(x.grad(), exp as f64 * input.powi(exp - 1));
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.5)]
    #[case(-2.0)]
    fn test_tanh(#[case] input: f64) {
        let graph = Graph::new();
        let x = graph.variable(input);

        let y = x.tanh();
        y.backward().unwrap();

        assert_eq!(y.value(), input.tanh());
        approx::assert_abs_diff_eq!(x.grad(), 1.0 - input.tanh().powi(2), epsilon = 1e-12);
    }

    #[rstest]
    #[case(1.0, 0.8)]
    #[case(0.0, 0.3)]
    #[case(0.5, 0.5)]
    fn test_binary_cross_entropy(#[case] target: f64, #[case] prob: f64) {
        let graph = Graph::new();
        let q = graph.variable(prob);

        let loss = q.binary_cross_entropy(target);
        loss.backward().unwrap();

        let eps = 1e-4;
        let expected = -0.5 * target * (prob + eps).ln() - 0.5 * (1.0 - target) * (1.0 - prob + eps).ln();
        let bumped = |p: f64| {
            -0.5 * target * (p + eps).ln() - 0.5 * (1.0 - target) * (1.0 - p + eps).ln()
        };
        let numerical = (bumped(prob + 1e-6) - bumped(prob - 1e-6)) / 2e-6;
        approx::assert_abs_diff_eq!(loss.value(), expected, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(q.grad(), numerical, epsilon = 1e-6);
        assert_eq!(loss.operands().len(), 1);
    }

    #[test]
    fn test_compound_expr() {
        let graph = Graph::new();
        let x = graph.variable(1.0);
        let y = graph.variable(2.0);
        let z = &x - &y;

        // w = (x - y) * exp(x - y) + (x * y)^3
        // dw/dx = (x - y + 1) * exp(x - y) + 3 * y * (x * y)^2
        // dw/dy = -(x - y + 1) * exp(x - y) + 3 * x * (x * y)^2
        let w = &z * &z.exp() + (&x * &y).powi(3);
        w.backward().unwrap();

        assert_eq!(w.value(), -(-1f64).exp() + 8.);
        assert_eq!(x.grad(), 24.);
        assert_eq!(y.grad(), 12.);
    }

    #[test]
    fn test_custom() {
        let graph = Graph::new();
        let x = graph.variable(1.0);
        let y = graph.variable(2.0);
        let z = graph.variable(3.0);

        // f(x, y, z) = x * y * z
        let (xv, yv, zv) = (x.value(), y.value(), z.value());
        let f = graph
            .custom(
                "prod3",
                &[&x, &y, &z],
                xv * yv * zv,
                Box::new(move |g| vec![g * yv * zv, g * xv * zv, g * xv * yv]),
            )
            .unwrap();
        f.backward().unwrap();

        assert_eq!(f.value(), 6.0);
        assert!(f.requires_grad());
        assert_eq!(x.grad(), 6.0);
        assert_eq!(y.grad(), 3.0);
        assert_eq!(z.grad(), 2.0);
    }

    #[test]
    fn test_custom_err_different_graphs() {
        let graph = Graph::new();
        let x = Graph::new().variable(1.0);

        let err = graph
            .custom("id", &[&x], 1.0, Box::new(|g| vec![g]))
            .unwrap_err();

        assert_eq!(err, Error::DifferentGraphs("custom"));
    }
}
