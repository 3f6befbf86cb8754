//! Peggy contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the parts of
//! `Peggy.sol` the orchestrator reads from and writes to.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// Peggy bridge contract interface
    #[sol(rpc)]
    contract Peggy {
        struct ValsetArgs {
            address[] validators;
            uint256[] powers;
            uint256 valsetNonce;
            uint256 rewardAmount;
            address rewardToken;
        }

        // ========================================================================
        // Events
        // ========================================================================

        /// Deposit emitted by older contract versions
        event SendToCosmosEvent(
            address indexed _tokenContract,
            address indexed _sender,
            bytes32 indexed _destination,
            uint256 _amount,
            uint256 _eventNonce
        );

        /// Deposit with an attached data payload
        event SendToInjectiveEvent(
            address indexed _tokenContract,
            address indexed _sender,
            bytes32 indexed _destination,
            uint256 _amount,
            uint256 _eventNonce,
            string _data
        );

        event TransactionBatchExecutedEvent(
            uint256 indexed _batchNonce,
            address indexed _token,
            uint256 _eventNonce
        );

        event ERC20DeployedEvent(
            string _cosmosDenom,
            address indexed _tokenContract,
            string _name,
            string _symbol,
            uint8 _decimals,
            uint256 _eventNonce
        );

        event ValsetUpdatedEvent(
            uint256 indexed _newValsetNonce,
            uint256 _eventNonce,
            uint256 _rewardAmount,
            address _rewardToken,
            address[] _validators,
            uint256[] _powers
        );

        // ========================================================================
        // Views
        // ========================================================================

        function state_lastValsetNonce() external view returns (uint256);

        function state_peggyId() external view returns (bytes32);

        function lastBatchNonce(address _erc20Address) external view returns (uint256);

        // ========================================================================
        // Relayer Methods
        // ========================================================================

        function updateValset(
            ValsetArgs memory _newValset,
            ValsetArgs memory _currentValset,
            uint8[] memory _v,
            bytes32[] memory _r,
            bytes32[] memory _s
        ) external;

        function submitBatch(
            ValsetArgs memory _currentValset,
            uint8[] memory _v,
            bytes32[] memory _r,
            bytes32[] memory _s,
            uint256[] memory _amounts,
            address[] memory _destinations,
            uint256[] memory _fees,
            uint256 _batchNonce,
            address _tokenContract,
            uint256 _batchTimeout
        ) external;
    }
}
