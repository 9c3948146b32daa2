//! Order processor and permit token bindings, plus call-data builders for
//! the `multicall(selfPermit, requestOrder)` batch.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::eip712::PermitSignature;

sol! {
    #[sol(rpc)]
    interface IOrderProcessor {
        #[derive(Debug, PartialEq, Eq)]
        struct Order {
            address recipient;
            address assetToken;
            address paymentToken;
            bool sell;
            uint8 orderType;
            uint256 assetTokenQuantity;
            uint256 paymentTokenQuantity;
            uint256 price;
            uint8 tif;
            address splitRecipient;
            uint256 splitAmount;
        }

        event OrderRequested(uint256 indexed id, address indexed recipient, Order order);
        event OrderFill(
            uint256 indexed id,
            address indexed paymentToken,
            address indexed assetToken,
            address requester,
            uint256 assetAmount,
            uint256 paymentAmount,
            uint256 feesTaken,
            bool sell
        );

        function selfPermit(
            address permitToken,
            address owner,
            uint256 value,
            uint256 deadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
        function requestOrder(Order calldata order) external returns (uint256 id);
        function requestCancel(uint256 id) external;
        function multicall(bytes[] calldata data) external returns (bytes[] memory results);
        function estimateTotalFeesForOrder(
            address requester,
            bool sell,
            address paymentToken,
            uint256 paymentTokenOrderValue
        ) external view returns (uint256);
        function maxOrderDecimals(address token) external view returns (int8);
        function getOrderStatus(uint256 id) external view returns (uint8);
    }
}

// ERC-20 with EIP-2612 permit. `version()` is optional on-chain.
sol! {
    #[sol(rpc)]
    interface IERC20Permit {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
        function name() external view returns (string);
        function version() external view returns (string);
        function decimals() external view returns (uint8);
        function nonces(address owner) external view returns (uint256);
        function DOMAIN_SEPARATOR() external view returns (bytes32);
    }
}

pub use IOrderProcessor::Order;

/// `selfPermit(token, owner, value, deadline, v, r, s)` call data.
pub fn self_permit_calldata(
    token: Address,
    owner: Address,
    value: U256,
    deadline: U256,
    signature: &PermitSignature,
) -> Bytes {
    IOrderProcessor::selfPermitCall {
        permitToken: token,
        owner,
        value,
        deadline,
        v: signature.v,
        r: signature.r,
        s: signature.s,
    }
    .abi_encode()
    .into()
}

/// `requestOrder(order)` call data.
pub fn request_order_calldata(order: &Order) -> Bytes {
    IOrderProcessor::requestOrderCall {
        order: order.clone(),
    }
    .abi_encode()
    .into()
}

/// `multicall(calls)` call data.
pub fn multicall_calldata(calls: Vec<Bytes>) -> Bytes {
    IOrderProcessor::multicallCall { data: calls }.abi_encode().into()
}
