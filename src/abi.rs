// Contract ABI bindings
// Router, pool, factory, ERC-20 and paymaster-flow interfaces used to build calldata
// and decode call results
//
// Numan Thabit 2025 Nov

use alloy_sol_types::{sol, SolError};

sol! {
    /// Router entry point. Each path is a chain of pool steps fed by `amountIn` of `tokenIn`.
    #[derive(Debug, PartialEq, Eq)]
    interface IRouter {
        struct SwapStep {
            address pool;
            bytes data;
            address callback;
            bytes callbackData;
        }

        struct SwapPath {
            SwapStep[] steps;
            address tokenIn;
            uint256 amountIn;
        }

        function swap(SwapPath[] paths, uint256 amountOutMin, uint256 deadline) external payable returns (uint256 amountOut);

        error TooLittleReceived();
        error Expired();
    }

    /// Per-step payload understood by classic pools.
    #[derive(Debug, PartialEq, Eq)]
    struct StepData {
        address tokenIn;
        address to;
        uint8 withdrawMode;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IPool {
        function getReserves() external view returns (uint256 reserve0, uint256 reserve1);
        function token0() external view returns (address token);
        function token1() external view returns (address token);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IPoolFactory {
        function getPool(address tokenA, address tokenB) external view returns (address pool);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IERC20 {
        function decimals() external view returns (uint8 value);
        function balanceOf(address owner) external view returns (uint256 balance);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function approve(address spender, uint256 value) external returns (bool ok);
        function transfer(address to, uint256 value) external returns (bool ok);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IPaymasterFlow {
        function general(bytes input) external;
    }
}

/// Hex of the router's slippage error selector, as it shows up in revert data.
pub fn too_little_received_selector_hex() -> String {
    hex::encode(IRouter::TooLittleReceived::SELECTOR)
}
