use alloy::sol;

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface Multicall {
        struct Call {
            address target;
            bytes callData;
        }

        function aggregate(Call[] calldata calls) external returns (uint256 blockNumber, bytes[] memory returnData);
        function getEthBalance(address addr) external view returns (uint256 balance);
    }
);

sol!(
    #[allow(missing_docs)]
    interface LockableToken {
        function authorizeOperator(address operator) external;
    }
);

sol!(
    #[allow(missing_docs)]
    interface MintableToken {
        function lock(address minterAddress, uint256 amount) external;
        function unlock() external;
        function mintToAddress(address sourceAddress, address targetAddress, uint256 targetBlock) external;
        function burnToAddress(address targetAddress, uint256 amount) external;
    }
);

sol!(
    #[allow(missing_docs)]
    interface Market {
        function deposit(uint256 amountToDeposit, uint256 rewardsPercent, uint256 minBlockNumber, uint256 minBurnAmount) external;
        function withdrawAll() external;
        function burnTokens(uint256 amountToBurn, address burnToAddress) external;
    }
);
